// 👷 Employee Entity - registry keyed by CPF
//
// CPF is the stable identity of an employee; everything else is a value
// that can change. Payment routing accepts either a PIX key or a complete
// bank tuple; a record with neither is rejected at registration time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::cpf::{is_valid_cpf, normalize_cpf};

// ============================================================================
// EMPLOYEE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "Active",
            EmployeeStatus::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(EmployeeStatus::Active),
            "Inactive" => Some(EmployeeStatus::Inactive),
            _ => None,
        }
    }
}

// ============================================================================
// EMPLOYEE ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    /// Normalized 11-digit CPF - the primary key, never changes
    pub cpf: String,

    pub name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>,

    /// PIS number used by time-clock terminals
    pub pis: Option<String>,

    /// Identifier assigned by the facial-recognition terminal
    pub face_id: Option<String>,

    // Address
    pub address: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub education_level: Option<String>,

    // Payment routing: PIX key OR the full bank tuple
    pub bank_code: Option<String>,
    pub bank_name: Option<String>,
    pub branch_code: Option<String>,
    pub account_number: Option<String>,
    pub account_variant: Option<String>,
    pub pix_key: Option<String>,

    pub notes: Option<String>,
    pub status: EmployeeStatus,
}

impl Employee {
    /// Create an employee with the required fields; the CPF is normalized
    /// on the way in. Optional fields start empty.
    pub fn new(cpf: &str, name: &str, birth_date: NaiveDate) -> Self {
        Employee {
            cpf: normalize_cpf(cpf),
            name: name.to_string(),
            birth_date,
            sex: None,
            pis: None,
            face_id: None,
            address: None,
            district: None,
            city: None,
            state: None,
            postal_code: None,
            phone: None,
            education_level: None,
            bank_code: None,
            bank_name: None,
            branch_code: None,
            account_number: None,
            account_variant: None,
            pix_key: None,
            notes: None,
            status: EmployeeStatus::Active,
        }
    }

    /// True when the full bank tuple (code, name, branch, account) is present.
    pub fn has_complete_bank_details(&self) -> bool {
        [
            &self.bank_code,
            &self.bank_name,
            &self.branch_code,
            &self.account_number,
        ]
        .iter()
        .all(|f| f.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false))
    }

    /// Payment rule: a PIX key or the complete bank tuple.
    pub fn has_payment_route(&self) -> bool {
        let has_pix = self
            .pix_key
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);

        has_pix || self.has_complete_bank_details()
    }
}

// ============================================================================
// EMPLOYEE REGISTRY
// ============================================================================

/// All employees, shared across importers and report code.
pub struct EmployeeRegistry {
    employees: Arc<RwLock<Vec<Employee>>>,
}

impl EmployeeRegistry {
    pub fn new() -> Self {
        EmployeeRegistry {
            employees: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a registry from records already admitted to storage,
    /// skipping the registration checks.
    pub fn load(employees: Vec<Employee>) -> Self {
        EmployeeRegistry {
            employees: Arc::new(RwLock::new(employees)),
        }
    }

    /// Register a new employee. Rejects an invalid CPF, a CPF already on
    /// file, and a record without a payment route.
    pub fn register(&mut self, employee: Employee) -> Result<(), String> {
        if !is_valid_cpf(&employee.cpf) {
            return Err(format!("invalid CPF: {}", employee.cpf));
        }

        if !employee.has_payment_route() {
            return Err(
                "payment route required: a PIX key or the complete bank details".to_string(),
            );
        }

        let mut employees = self.employees.write().unwrap();
        if employees.iter().any(|e| e.cpf == employee.cpf) {
            return Err(format!("CPF already registered: {}", employee.cpf));
        }

        employees.push(employee);
        Ok(())
    }

    /// Look up by exact CPF (normalized first).
    pub fn find_by_cpf(&self, cpf: &str) -> Option<Employee> {
        let clean = normalize_cpf(cpf);
        let employees = self.employees.read().unwrap();
        employees.iter().find(|e| e.cpf == clean).cloned()
    }

    /// Identifier lookup with fallback: CPF first, then PIS, then face id.
    /// This is what time-clock matching runs on.
    pub fn find_by_identifier(&self, identifier: &str) -> Option<Employee> {
        let raw = identifier.trim();
        let clean = normalize_cpf(raw);
        let employees = self.employees.read().unwrap();

        let by = |f: &dyn Fn(&Employee) -> bool| employees.iter().find(|&e| f(e)).cloned();

        by(&|e: &Employee| e.cpf == raw || (!clean.is_empty() && e.cpf == clean))
            .or_else(|| {
                by(&|e: &Employee| {
                    e.pis
                        .as_deref()
                        .map(|p| p == raw || (!clean.is_empty() && p == clean))
                        .unwrap_or(false)
                })
            })
            .or_else(|| {
                by(&|e: &Employee| {
                    e.face_id
                        .as_deref()
                        .map(|f| f == raw || (!clean.is_empty() && f == clean))
                        .unwrap_or(false)
                })
            })
    }

    /// Update an employee in place. The CPF itself cannot change.
    pub fn update<F>(&mut self, cpf: &str, mut update_fn: F) -> Result<Employee, String>
    where
        F: FnMut(&mut Employee),
    {
        let clean = normalize_cpf(cpf);
        let mut employees = self.employees.write().unwrap();

        let slot = employees
            .iter_mut()
            .find(|e| e.cpf == clean)
            .ok_or_else(|| format!("employee not found: {}", cpf))?;

        // Mutate a copy first so a rejected update leaves the record intact
        let mut next = slot.clone();
        update_fn(&mut next);
        next.cpf = slot.cpf.clone();

        if !next.has_payment_route() {
            return Err(
                "payment route required: a PIX key or the complete bank details".to_string(),
            );
        }

        *slot = next.clone();
        Ok(next)
    }

    pub fn all(&self) -> Vec<Employee> {
        self.employees.read().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.employees.read().unwrap().len()
    }

    pub fn active(&self) -> Vec<Employee> {
        self.employees
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.status == EmployeeStatus::Active)
            .cloned()
            .collect()
    }
}

impl Default for EmployeeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
