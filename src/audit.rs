// 📜 Audit Trail - every change is an event
//
// One event per mutating operation: who did it, what it touched, and the
// old/new snapshots as JSON. Events are append-only; the trail is the
// history, so entities themselves don't carry versions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::users::ActorContext;

// ============================================================================
// AUDIT EVENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,

    /// Human-readable description, e.g. "Employee Maria Souza (111...) added."
    pub action: String,

    pub affected_table: String,
    pub record_id: String,

    /// Snapshot before the change (None on insert)
    pub old_data: Option<serde_json::Value>,

    /// Snapshot after the change (None on delete)
    pub new_data: Option<serde_json::Value>,

    pub actor_code: i64,
    pub actor: String,
}

impl AuditEvent {
    pub fn new(actor: &ActorContext, action: &str, affected_table: &str, record_id: &str) -> Self {
        AuditEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            affected_table: affected_table.to_string(),
            record_id: record_id.to_string(),
            old_data: None,
            new_data: None,
            actor_code: actor.user_code,
            actor: actor.username.clone(),
        }
    }

    /// Attach before/after snapshots.
    pub fn with_change(
        mut self,
        old_data: Option<serde_json::Value>,
        new_data: Option<serde_json::Value>,
    ) -> Self {
        self.old_data = old_data;
        self.new_data = new_data;
        self
    }
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// In-memory append-only trail; the SQLite layer persists the same shape.
pub struct AuditTrail {
    events: Vec<AuditEvent>,
}

impl AuditTrail {
    pub fn new() -> Self {
        AuditTrail { events: Vec::new() }
    }

    pub fn append(&mut self, event: AuditEvent) {
        self.events.push(event);
    }

    pub fn all(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Events touching one record, newest first.
    pub fn for_record(&self, affected_table: &str, record_id: &str) -> Vec<&AuditEvent> {
        let mut events: Vec<&AuditEvent> = self
            .events
            .iter()
            .filter(|e| e.affected_table == affected_table && e.record_id == record_id)
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events
    }

    /// Events in a closed time range.
    pub fn in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .collect()
    }

    pub fn by_actor(&self, actor_code: i64) -> Vec<&AuditEvent> {
        self.events
            .iter()
            .filter(|e| e.actor_code == actor_code)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;
    use chrono::Duration;

    fn actor() -> ActorContext {
        ActorContext::new(1, "ana", Role::Master)
    }

    #[test]
    fn test_event_carries_actor_and_uuid() {
        let event = AuditEvent::new(&actor(), "Employee added.", "employees", "11144477735");

        assert_eq!(event.actor, "ana");
        assert_eq!(event.actor_code, 1);
        assert!(!event.event_id.is_empty());
        assert!(event.old_data.is_none());
    }

    #[test]
    fn test_with_change_snapshots() {
        let event = AuditEvent::new(&actor(), "Employee edited.", "employees", "11144477735")
            .with_change(
                Some(serde_json::json!({"phone": null})),
                Some(serde_json::json!({"phone": "+55 11 98765-4321"})),
            );

        assert_eq!(
            event.new_data.unwrap()["phone"],
            serde_json::json!("+55 11 98765-4321")
        );
    }

    #[test]
    fn test_for_record_filters_and_orders() {
        let mut trail = AuditTrail::new();

        let mut first = AuditEvent::new(&actor(), "added", "employees", "11144477735");
        first.timestamp = Utc::now() - Duration::seconds(10);
        trail.append(first);
        trail.append(AuditEvent::new(&actor(), "edited", "employees", "11144477735"));
        trail.append(AuditEvent::new(&actor(), "added", "contracts", "1"));

        let events = trail.for_record("employees", "11144477735");
        assert_eq!(events.len(), 2);
        // Newest first
        assert_eq!(events[0].action, "edited");
    }

    #[test]
    fn test_in_range_and_by_actor() {
        let mut trail = AuditTrail::new();
        let now = Utc::now();

        let mut old = AuditEvent::new(&actor(), "old", "employees", "x");
        old.timestamp = now - Duration::days(30);
        trail.append(old);
        trail.append(AuditEvent::new(&actor(), "recent", "employees", "y"));

        let recent = trail.in_range(now - Duration::days(1), now + Duration::days(1));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, "recent");

        assert_eq!(trail.by_actor(1).len(), 2);
        assert_eq!(trail.by_actor(2).len(), 0);
    }
}
