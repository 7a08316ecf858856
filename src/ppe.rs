// 🦺 Uniforms & PPE - catalog, distribution and returns
//
// Catalog items are uniforms or protective equipment with a unique stock
// code; PPE items additionally carry an approval certificate when handed
// out. Replacement periodicity on the item drives the due date of each
// distribution.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cpf::normalize_cpf;

// ============================================================================
// CATALOG ITEM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Uniform,
    Ppe,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Uniform => "Uniform",
            ItemKind::Ppe => "PPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Uniform" => Some(ItemKind::Uniform),
            "PPE" => Some(ItemKind::Ppe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub kind: ItemKind,
    pub description: String,

    /// Unique stock code
    pub code: String,

    /// Role names allowed to receive this item; empty = unrestricted
    pub allowed_roles: Vec<String>,

    /// Days until a handed-out unit should be replaced
    pub replacement_days: Option<u32>,

    pub supplier: Option<String>,
    pub notes: Option<String>,
}

impl CatalogItem {
    pub fn allows_role(&self, role: &str) -> bool {
        self.allowed_roles.is_empty()
            || self
                .allowed_roles
                .iter()
                .any(|r| r.eq_ignore_ascii_case(role.trim()))
    }
}

// ============================================================================
// DISTRIBUTION & RETURN
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: i64,
    pub item_id: i64,
    pub employee_cpf: String,
    pub quantity: u32,

    /// PPE approval certificate number, when applicable
    pub approval_certificate: Option<String>,

    pub delivered_at: DateTime<Utc>,
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: i64,
    pub distribution_id: i64,
    pub returned_at: DateTime<Utc>,
    pub reason: Option<String>,

    /// Condition of the returned item, e.g. "Worn out", "Damaged"
    pub item_condition: Option<String>,
    pub notes: Option<String>,
}

// ============================================================================
// PPE REGISTRY
// ============================================================================

pub struct PpeRegistry {
    items: Vec<CatalogItem>,
    distributions: Vec<Distribution>,
    returns: Vec<ReturnRecord>,
    next_item_id: i64,
    next_distribution_id: i64,
    next_return_id: i64,
}

impl PpeRegistry {
    pub fn new() -> Self {
        PpeRegistry {
            items: Vec::new(),
            distributions: Vec::new(),
            returns: Vec::new(),
            next_item_id: 1,
            next_distribution_id: 1,
            next_return_id: 1,
        }
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    pub fn add_item(&mut self, mut item: CatalogItem) -> Result<i64, String> {
        let code = item.code.trim().to_string();
        if code.is_empty() {
            return Err("item code cannot be empty".to_string());
        }
        if self.items.iter().any(|i| i.code.eq_ignore_ascii_case(&code)) {
            return Err(format!("item code already exists: {}", code));
        }

        item.code = code;
        item.id = self.next_item_id;
        self.next_item_id += 1;

        let id = item.id;
        self.items.push(item);
        Ok(id)
    }

    pub fn find_item(&self, id: i64) -> Option<&CatalogItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn find_item_by_code(&self, code: &str) -> Option<&CatalogItem> {
        self.items
            .iter()
            .find(|i| i.code.eq_ignore_ascii_case(code.trim()))
    }

    // ------------------------------------------------------------------------
    // Distribution
    // ------------------------------------------------------------------------

    /// Hand an item out. The employee's role must be allowed for the item
    /// and the quantity must be at least 1.
    pub fn distribute(
        &mut self,
        item_id: i64,
        employee_cpf: &str,
        employee_role: &str,
        quantity: u32,
        delivered_at: DateTime<Utc>,
        responsible: Option<&str>,
        approval_certificate: Option<&str>,
    ) -> Result<i64, String> {
        let item = self
            .find_item(item_id)
            .ok_or_else(|| format!("unknown catalog item: {}", item_id))?;

        if quantity < 1 {
            return Err("quantity must be at least 1".to_string());
        }

        if !item.allows_role(employee_role) {
            return Err(format!(
                "item {} is not allowed for role {}",
                item.code, employee_role
            ));
        }

        let id = self.next_distribution_id;
        self.next_distribution_id += 1;

        self.distributions.push(Distribution {
            id,
            item_id,
            employee_cpf: normalize_cpf(employee_cpf),
            quantity,
            approval_certificate: approval_certificate.map(|c| c.to_string()),
            delivered_at,
            responsible: responsible.map(|r| r.to_string()),
        });
        Ok(id)
    }

    pub fn distributions_of(&self, employee_cpf: &str) -> Vec<&Distribution> {
        let clean = normalize_cpf(employee_cpf);
        self.distributions
            .iter()
            .filter(|d| d.employee_cpf == clean)
            .collect()
    }

    /// Replacement due date of a distribution, from the item's periodicity.
    pub fn replacement_due(&self, distribution_id: i64) -> Option<NaiveDate> {
        let distribution = self
            .distributions
            .iter()
            .find(|d| d.id == distribution_id)?;
        let item = self.find_item(distribution.item_id)?;
        let days = item.replacement_days?;

        Some(distribution.delivered_at.date_naive() + Duration::days(days as i64))
    }

    /// Distributions whose replacement is due by as_of and that were not
    /// returned yet.
    pub fn replacements_due(&self, as_of: NaiveDate) -> Vec<&Distribution> {
        self.distributions
            .iter()
            .filter(|d| {
                self.replacement_due(d.id)
                    .map(|due| due <= as_of)
                    .unwrap_or(false)
            })
            .filter(|d| !self.is_returned(d.id))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Returns
    // ------------------------------------------------------------------------

    pub fn record_return(
        &mut self,
        distribution_id: i64,
        returned_at: DateTime<Utc>,
        reason: Option<&str>,
        item_condition: Option<&str>,
    ) -> Result<i64, String> {
        if !self.distributions.iter().any(|d| d.id == distribution_id) {
            return Err(format!("unknown distribution: {}", distribution_id));
        }

        let id = self.next_return_id;
        self.next_return_id += 1;

        self.returns.push(ReturnRecord {
            id,
            distribution_id,
            returned_at,
            reason: reason.map(|r| r.to_string()),
            item_condition: item_condition.map(|c| c.to_string()),
            notes: None,
        });
        Ok(id)
    }

    pub fn is_returned(&self, distribution_id: i64) -> bool {
        self.returns
            .iter()
            .any(|r| r.distribution_id == distribution_id)
    }

    pub fn returns_of(&self, distribution_id: i64) -> Vec<&ReturnRecord> {
        self.returns
            .iter()
            .filter(|r| r.distribution_id == distribution_id)
            .collect()
    }
}

impl Default for PpeRegistry {
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
    use chrono::TimeZone;

    fn helmet() -> CatalogItem {
        CatalogItem {
            id: 0,
            kind: ItemKind::Ppe,
            description: "Safety helmet class B".to_string(),
            code: "EPI-001".to_string(),
            allowed_roles: vec!["Machine Operator".to_string()],
            replacement_days: Some(180),
            supplier: Some("SafeCo".to_string()),
            notes: None,
        }
    }

    fn delivered() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_add_item_unique_code() {
        let mut registry = PpeRegistry::new();
        registry.add_item(helmet()).unwrap();

        let mut dup = helmet();
        dup.description = "Another helmet".to_string();
        assert!(registry.add_item(dup).is_err());

        assert!(registry.find_item_by_code("epi-001").is_some());
    }

    #[test]
    fn test_distribute_checks_role_and_quantity() {
        let mut registry = PpeRegistry::new();
        let item_id = registry.add_item(helmet()).unwrap();

        let err = registry
            .distribute(
                item_id,
                "11144477735",
                "Accountant",
                1,
                delivered(),
                None,
                None,
            )
            .unwrap_err();
        assert!(err.contains("not allowed for role"));

        let err = registry
            .distribute(
                item_id,
                "11144477735",
                "Machine Operator",
                0,
                delivered(),
                None,
                None,
            )
            .unwrap_err();
        assert!(err.contains("quantity"));

        registry
            .distribute(
                item_id,
                "111.444.777-35",
                "machine operator",
                2,
                delivered(),
                Some("Warehouse"),
                Some("CA-12345"),
            )
            .unwrap();

        let distributions = registry.distributions_of("11144477735");
        assert_eq!(distributions.len(), 1);
        assert_eq!(distributions[0].quantity, 2);
        assert_eq!(distributions[0].approval_certificate.as_deref(), Some("CA-12345"));
    }

    #[test]
    fn test_unrestricted_item_allows_any_role() {
        let mut registry = PpeRegistry::new();
        let mut shirt = helmet();
        shirt.kind = ItemKind::Uniform;
        shirt.code = "UNI-001".to_string();
        shirt.allowed_roles = Vec::new();
        let item_id = registry.add_item(shirt).unwrap();

        assert!(registry
            .distribute(item_id, "11144477735", "Accountant", 1, delivered(), None, None)
            .is_ok());
    }

    #[test]
    fn test_replacement_due_date() {
        let mut registry = PpeRegistry::new();
        let item_id = registry.add_item(helmet()).unwrap();
        let dist_id = registry
            .distribute(
                item_id,
                "11144477735",
                "Machine Operator",
                1,
                delivered(),
                None,
                None,
            )
            .unwrap();

        // 2024-01-10 + 180 days
        assert_eq!(
            registry.replacement_due(dist_id),
            Some(NaiveDate::from_ymd_opt(2024, 7, 8).unwrap())
        );
    }

    #[test]
    fn test_replacements_due_excludes_returned() {
        let mut registry = PpeRegistry::new();
        let item_id = registry.add_item(helmet()).unwrap();
        let dist_id = registry
            .distribute(
                item_id,
                "11144477735",
                "Machine Operator",
                1,
                delivered(),
                None,
                None,
            )
            .unwrap();

        let as_of = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(registry.replacements_due(as_of).len(), 1);

        registry
            .record_return(
                dist_id,
                Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap(),
                Some("worn out"),
                Some("Worn out"),
            )
            .unwrap();

        assert!(registry.is_returned(dist_id));
        assert_eq!(registry.replacements_due(as_of).len(), 0);
    }

    #[test]
    fn test_return_requires_existing_distribution() {
        let mut registry = PpeRegistry::new();
        let err = registry
            .record_return(99, delivered(), None, None)
            .unwrap_err();
        assert!(err.contains("unknown distribution"));
    }
}
