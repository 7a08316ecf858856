// 🏖️ Vacation Control - accrual periods and taken days
//
// Each record pairs one accrual period with the vacation days taken
// against it. Date ordering rules are enforced at registration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cpf::normalize_cpf;
use crate::entities::employee::EmployeeRegistry;

// ============================================================================
// VACATION RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacationRecord {
    pub id: i64,
    pub employee_cpf: String,

    pub accrual_start: NaiveDate,
    pub accrual_end: NaiveDate,

    pub taken_start: Option<NaiveDate>,
    pub taken_end: Option<NaiveDate>,
}

impl VacationRecord {
    pub fn new(employee_cpf: &str, accrual_start: NaiveDate, accrual_end: NaiveDate) -> Self {
        VacationRecord {
            id: 0,
            employee_cpf: normalize_cpf(employee_cpf),
            accrual_start,
            accrual_end,
            taken_start: None,
            taken_end: None,
        }
    }

    /// Date ordering rules:
    /// - accrual start strictly before accrual end
    /// - taken start strictly before taken end when both present
    /// - taken start inside the accrual period
    pub fn validate(&self) -> Result<(), String> {
        if self.accrual_start >= self.accrual_end {
            return Err("accrual period start must be before its end".to_string());
        }

        if let (Some(start), Some(end)) = (self.taken_start, self.taken_end) {
            if start >= end {
                return Err("taken vacation start must be before its end".to_string());
            }
        }

        if let Some(start) = self.taken_start {
            if start < self.accrual_start || start > self.accrual_end {
                return Err("taken vacation must fall inside the accrual period".to_string());
            }
        }

        Ok(())
    }

    /// Whether any vacation days were taken against this accrual.
    pub fn is_taken(&self) -> bool {
        self.taken_start.is_some() && self.taken_end.is_some()
    }
}

// ============================================================================
// VACATION REGISTRY
// ============================================================================

pub struct VacationRegistry {
    records: Vec<VacationRecord>,
    next_id: i64,
}

impl VacationRegistry {
    pub fn new() -> Self {
        VacationRegistry {
            records: Vec::new(),
            next_id: 1,
        }
    }

    pub fn register(
        &mut self,
        mut record: VacationRecord,
        employees: &EmployeeRegistry,
    ) -> Result<i64, String> {
        if employees.find_by_cpf(&record.employee_cpf).is_none() {
            return Err(format!("employee not found: {}", record.employee_cpf));
        }

        record.validate()?;

        record.id = self.next_id;
        self.next_id += 1;

        let id = record.id;
        self.records.push(record);
        Ok(id)
    }

    pub fn update<F>(&mut self, id: i64, mut update_fn: F) -> Result<VacationRecord, String>
    where
        F: FnMut(&mut VacationRecord),
    {
        let slot = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| format!("vacation record not found: {}", id))?;

        let mut next = slot.clone();
        update_fn(&mut next);
        next.id = slot.id;
        next.validate()?;

        *slot = next.clone();
        Ok(next)
    }

    pub fn records_of(&self, employee_cpf: &str) -> Vec<&VacationRecord> {
        let clean = normalize_cpf(employee_cpf);
        self.records
            .iter()
            .filter(|r| r.employee_cpf == clean)
            .collect()
    }

    /// Accrual periods with no taken days yet - what HR chases.
    pub fn open_accruals(&self, employee_cpf: &str) -> Vec<&VacationRecord> {
        self.records_of(employee_cpf)
            .into_iter()
            .filter(|r| !r.is_taken())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}

impl Default for VacationRegistry {
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
    use crate::entities::employee::Employee;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employees() -> EmployeeRegistry {
        let mut registry = EmployeeRegistry::new();
        let mut e = Employee::new("11144477735", "Maria Souza", date(1990, 5, 20));
        e.pix_key = Some("maria@example.com".to_string());
        registry.register(e).unwrap();
        registry
    }

    #[test]
    fn test_register_valid_record() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let record = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        let id = registry.register(record, &employees).unwrap();

        assert_eq!(id, 1);
        assert_eq!(registry.open_accruals("11144477735").len(), 1);
    }

    #[test]
    fn test_accrual_order_enforced() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let record = VacationRecord::new("11144477735", date(2024, 1, 1), date(2024, 1, 1));
        let err = registry.register(record, &employees).unwrap_err();
        assert!(err.contains("accrual period start"));
    }

    #[test]
    fn test_taken_order_enforced() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let mut record = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        record.taken_start = Some(date(2023, 7, 20));
        record.taken_end = Some(date(2023, 7, 10));

        let err = registry.register(record, &employees).unwrap_err();
        assert!(err.contains("taken vacation start"));
    }

    #[test]
    fn test_taken_must_fall_inside_accrual() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let mut record = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        record.taken_start = Some(date(2024, 2, 1));
        record.taken_end = Some(date(2024, 2, 20));

        let err = registry.register(record, &employees).unwrap_err();
        assert!(err.contains("inside the accrual period"));
    }

    #[test]
    fn test_unknown_employee_rejected() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let record = VacationRecord::new("52998224725", date(2023, 1, 2), date(2024, 1, 1));
        let err = registry.register(record, &employees).unwrap_err();
        assert!(err.contains("employee not found"));
    }

    #[test]
    fn test_update_records_taken_days() {
        let employees = employees();
        let mut registry = VacationRegistry::new();

        let record = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        let id = registry.register(record, &employees).unwrap();

        let updated = registry
            .update(id, |r| {
                r.taken_start = Some(date(2023, 7, 10));
                r.taken_end = Some(date(2023, 8, 8));
            })
            .unwrap();

        assert!(updated.is_taken());
        assert_eq!(registry.open_accruals("11144477735").len(), 0);
    }
}
