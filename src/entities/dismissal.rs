// 🚪 Dismissals - termination records with notice-period data
//
// Registering a dismissal closes the employee's active contract. The
// written reason is mandatory and must carry at least 50 characters, a
// compliance requirement inherited from the paper process.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cpf::normalize_cpf;
use crate::entities::contract::ContractRegistry;

/// Minimum length of the written dismissal reason.
pub const MIN_REASON_LEN: usize = 50;

// ============================================================================
// DISMISSAL CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DismissalClassification {
    Positive,
    Neutral,
    Negative,
}

impl DismissalClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            DismissalClassification::Positive => "Positive",
            DismissalClassification::Neutral => "Neutral",
            DismissalClassification::Negative => "Negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Positive" => Some(DismissalClassification::Positive),
            "Neutral" => Some(DismissalClassification::Neutral),
            "Negative" => Some(DismissalClassification::Negative),
            _ => None,
        }
    }
}

// ============================================================================
// DISMISSAL RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dismissal {
    pub id: i64,
    pub employee_cpf: String,

    pub dismissal_date: NaiveDate,
    pub last_worked_day: NaiveDate,

    /// Kind of termination, e.g. "Resignation", "Without cause"
    pub termination_kind: String,
    pub classification: DismissalClassification,

    /// Written justification, MIN_REASON_LEN characters minimum
    pub reason: String,

    /// Notice arrangement, e.g. "Worked", "Paid out", "Waived"
    pub notice_type: String,
    pub notice_date: Option<NaiveDate>,
    pub notice_days: Option<u32>,
    pub notice_end_date: Option<NaiveDate>,
}

impl Dismissal {
    pub fn new(
        employee_cpf: &str,
        dismissal_date: NaiveDate,
        last_worked_day: NaiveDate,
        termination_kind: &str,
        reason: &str,
        notice_type: &str,
    ) -> Self {
        Dismissal {
            id: 0,
            employee_cpf: normalize_cpf(employee_cpf),
            dismissal_date,
            last_worked_day,
            termination_kind: termination_kind.to_string(),
            classification: DismissalClassification::Neutral,
            reason: reason.to_string(),
            notice_type: notice_type.to_string(),
            notice_date: None,
            notice_days: None,
            notice_end_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.reason.trim().chars().count() < MIN_REASON_LEN {
            return Err(format!(
                "dismissal reason must have at least {} characters",
                MIN_REASON_LEN
            ));
        }
        Ok(())
    }
}

// ============================================================================
// DISMISSAL REGISTRY
// ============================================================================

pub struct DismissalRegistry {
    dismissals: Vec<Dismissal>,
    next_id: i64,
}

impl DismissalRegistry {
    pub fn new() -> Self {
        DismissalRegistry {
            dismissals: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a dismissal and close the employee's active contract.
    ///
    /// Rejects a dismissal dated before the active contract's admission.
    /// When the employee has no active contract the record is still
    /// accepted (late paperwork for an already-closed contract).
    pub fn register(
        &mut self,
        mut dismissal: Dismissal,
        contracts: &mut ContractRegistry,
    ) -> Result<i64, String> {
        dismissal.validate()?;

        if let Some(active) = contracts.active_contract(&dismissal.employee_cpf) {
            if dismissal.dismissal_date < active.admission_date {
                return Err(
                    "dismissal date cannot be earlier than the contract admission date".to_string(),
                );
            }

            contracts.deactivate(active.id, dismissal.dismissal_date)?;
        }

        dismissal.id = self.next_id;
        self.next_id += 1;

        let id = dismissal.id;
        self.dismissals.push(dismissal);
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Dismissal> {
        self.dismissals.iter().find(|d| d.id == id)
    }

    pub fn dismissals_of(&self, employee_cpf: &str) -> Vec<&Dismissal> {
        let clean = normalize_cpf(employee_cpf);
        self.dismissals
            .iter()
            .filter(|d| d.employee_cpf == clean)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.dismissals.len()
    }
}

impl Default for DismissalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
