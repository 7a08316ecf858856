// 👪 Dependent Entity - family members linked to an employee
//
// Dependents carry their own CPF as primary key and an optional monthly
// family-allowance amount that payroll picks up while the dependent is
// active.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cpf::{is_valid_cpf, normalize_cpf};
use crate::entities::employee::EmployeeRegistry;

// ============================================================================
// DEPENDENT ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependent {
    /// The dependent's own CPF - primary key
    pub cpf: String,

    pub name: String,
    pub birth_date: NaiveDate,
    pub active: bool,

    /// CPF of the employee this dependent belongs to
    pub employee_cpf: String,

    /// Monthly family-allowance amount, 0.00 when not entitled
    pub family_allowance: f64,
}

impl Dependent {
    pub fn new(cpf: &str, name: &str, birth_date: NaiveDate, employee_cpf: &str) -> Self {
        Dependent {
            cpf: normalize_cpf(cpf),
            name: name.to_string(),
            birth_date,
            active: true,
            employee_cpf: normalize_cpf(employee_cpf),
            family_allowance: 0.0,
        }
    }
}

// ============================================================================
// DEPENDENT REGISTRY
// ============================================================================

pub struct DependentRegistry {
    dependents: Vec<Dependent>,
}

impl DependentRegistry {
    pub fn new() -> Self {
        DependentRegistry {
            dependents: Vec::new(),
        }
    }

    /// Register a dependent. The dependent's CPF must itself be valid and
    /// unique, and the linked employee must exist.
    pub fn register(
        &mut self,
        dependent: Dependent,
        employees: &EmployeeRegistry,
    ) -> Result<(), String> {
        if !is_valid_cpf(&dependent.cpf) {
            return Err(format!("invalid dependent CPF: {}", dependent.cpf));
        }

        if self.dependents.iter().any(|d| d.cpf == dependent.cpf) {
            return Err(format!("dependent CPF already registered: {}", dependent.cpf));
        }

        if employees.find_by_cpf(&dependent.employee_cpf).is_none() {
            return Err(format!(
                "employee not found for dependent: {}",
                dependent.employee_cpf
            ));
        }

        self.dependents.push(dependent);
        Ok(())
    }

    pub fn find_by_cpf(&self, cpf: &str) -> Option<&Dependent> {
        let clean = normalize_cpf(cpf);
        self.dependents.iter().find(|d| d.cpf == clean)
    }

    /// All dependents of one employee.
    pub fn dependents_of(&self, employee_cpf: &str) -> Vec<&Dependent> {
        let clean = normalize_cpf(employee_cpf);
        self.dependents
            .iter()
            .filter(|d| d.employee_cpf == clean)
            .collect()
    }

    /// Sum of family allowances for the employee's active dependents.
    pub fn family_allowance_total(&self, employee_cpf: &str) -> f64 {
        self.dependents_of(employee_cpf)
            .iter()
            .filter(|d| d.active)
            .map(|d| d.family_allowance)
            .sum()
    }

    /// Deactivate a dependent (e.g. aged out of entitlement).
    pub fn deactivate(&mut self, cpf: &str) -> Result<(), String> {
        let clean = normalize_cpf(cpf);
        let dependent = self
            .dependents
            .iter_mut()
            .find(|d| d.cpf == clean)
            .ok_or_else(|| format!("dependent not found: {}", cpf))?;

        dependent.active = false;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.dependents.len()
    }
}

impl Default for DependentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
