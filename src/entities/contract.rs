// 📄 Employment Contracts - one active contract per employee
//
// Contracts carry the denormalized sector/role names the way the payroll
// forms submit them. Salary adjustments are recorded as percentage events
// and composed in date order to obtain the current salary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::advance::round2;
use crate::cpf::normalize_cpf;

// ============================================================================
// CONTRACT ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Assigned by the registry on registration (0 = not yet registered)
    pub id: i64,

    pub employee_cpf: String,
    pub sector: String,
    pub role: String,

    /// Optional link to a shift schedule
    pub shift_schedule_id: Option<i64>,

    pub starting_salary: f64,
    pub bonus: f64,

    /// Hiring regime, e.g. "CLT", "Apprentice"
    pub hiring_regime: String,

    pub admission_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    pub active: bool,
}

impl Contract {
    pub fn new(
        employee_cpf: &str,
        sector: &str,
        role: &str,
        starting_salary: f64,
        hiring_regime: &str,
        admission_date: NaiveDate,
    ) -> Self {
        Contract {
            id: 0,
            employee_cpf: normalize_cpf(employee_cpf),
            sector: sector.to_string(),
            role: role.to_string(),
            shift_schedule_id: None,
            starting_salary,
            bonus: 0.0,
            hiring_regime: hiring_regime.to_string(),
            admission_date,
            termination_date: None,
            active: true,
        }
    }
}

// ============================================================================
// SALARY ADJUSTMENT
// ============================================================================

/// A percentage adjustment applied to salary and bonus from a given date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryAdjustment {
    pub id: i64,
    pub employee_cpf: String,
    pub effective_date: NaiveDate,
    pub salary_pct: f64,
    pub bonus_pct: f64,
}

impl SalaryAdjustment {
    pub fn new(
        employee_cpf: &str,
        effective_date: NaiveDate,
        salary_pct: f64,
        bonus_pct: f64,
    ) -> Self {
        SalaryAdjustment {
            id: 0,
            employee_cpf: normalize_cpf(employee_cpf),
            effective_date,
            salary_pct,
            bonus_pct,
        }
    }

    /// Apply this adjustment to a (salary, bonus) pair.
    pub fn apply(&self, salary: f64, bonus: f64) -> (f64, f64) {
        (
            round2(salary * (1.0 + self.salary_pct / 100.0)),
            round2(bonus * (1.0 + self.bonus_pct / 100.0)),
        )
    }
}

// ============================================================================
// CONTRACT REGISTRY
// ============================================================================

pub struct ContractRegistry {
    contracts: Arc<RwLock<Vec<Contract>>>,
    adjustments: Arc<RwLock<Vec<SalaryAdjustment>>>,
    next_contract_id: Arc<RwLock<i64>>,
    next_adjustment_id: Arc<RwLock<i64>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        ContractRegistry {
            contracts: Arc::new(RwLock::new(Vec::new())),
            adjustments: Arc::new(RwLock::new(Vec::new())),
            next_contract_id: Arc::new(RwLock::new(1)),
            next_adjustment_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Register a contract. An employee can hold at most one ACTIVE
    /// contract; the previous one must be deactivated first.
    pub fn register(&mut self, mut contract: Contract) -> Result<i64, String> {
        let mut contracts = self.contracts.write().unwrap();

        if contract.active
            && contracts
                .iter()
                .any(|c| c.employee_cpf == contract.employee_cpf && c.active)
        {
            return Err(format!(
                "employee {} already has an active contract",
                contract.employee_cpf
            ));
        }

        let mut next_id = self.next_contract_id.write().unwrap();
        contract.id = *next_id;
        *next_id += 1;

        let id = contract.id;
        contracts.push(contract);
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> Option<Contract> {
        self.contracts
            .read()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// The employee's active contract with the most recent admission date.
    pub fn active_contract(&self, employee_cpf: &str) -> Option<Contract> {
        let clean = normalize_cpf(employee_cpf);
        self.contracts
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.employee_cpf == clean && c.active)
            .max_by_key(|c| c.admission_date)
            .cloned()
    }

    pub fn contracts_of(&self, employee_cpf: &str) -> Vec<Contract> {
        let clean = normalize_cpf(employee_cpf);
        self.contracts
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.employee_cpf == clean)
            .cloned()
            .collect()
    }

    /// Deactivate a contract and stamp its termination date.
    pub fn deactivate(&mut self, id: i64, termination_date: NaiveDate) -> Result<(), String> {
        let mut contracts = self.contracts.write().unwrap();
        let contract = contracts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| format!("contract not found: {}", id))?;

        contract.active = false;
        contract.termination_date = Some(termination_date);
        Ok(())
    }

    pub fn count_active(&self) -> usize {
        self.contracts
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.active)
            .count()
    }

    // ------------------------------------------------------------------------
    // Salary adjustments
    // ------------------------------------------------------------------------

    pub fn record_adjustment(&mut self, mut adjustment: SalaryAdjustment) -> Result<i64, String> {
        {
            let contracts = self.contracts.read().unwrap();
            if !contracts
                .iter()
                .any(|c| c.employee_cpf == adjustment.employee_cpf)
            {
                return Err(format!(
                    "no contract on file for employee {}",
                    adjustment.employee_cpf
                ));
            }
        }

        let mut next_id = self.next_adjustment_id.write().unwrap();
        adjustment.id = *next_id;
        *next_id += 1;

        let id = adjustment.id;
        self.adjustments.write().unwrap().push(adjustment);
        Ok(id)
    }

    pub fn adjustments_of(&self, employee_cpf: &str) -> Vec<SalaryAdjustment> {
        let clean = normalize_cpf(employee_cpf);
        let mut list: Vec<SalaryAdjustment> = self
            .adjustments
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.employee_cpf == clean)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.effective_date);
        list
    }

    /// Current (salary, bonus) for the active contract: the starting values
    /// with every adjustment up to as_of composed in date order.
    pub fn current_compensation(
        &self,
        employee_cpf: &str,
        as_of: NaiveDate,
    ) -> Option<(f64, f64)> {
        let contract = self.active_contract(employee_cpf)?;

        let mut salary = contract.starting_salary;
        let mut bonus = contract.bonus;

        for adjustment in self
            .adjustments_of(employee_cpf)
            .iter()
            .filter(|a| a.effective_date >= contract.admission_date && a.effective_date <= as_of)
        {
            let (s, b) = adjustment.apply(salary, bonus);
            salary = s;
            bonus = b;
        }

        Some((salary, bonus))
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
