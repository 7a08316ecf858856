// 💸 Salary Advances - installment schedule generation
//
// An approved advance is recovered through payroll deductions spread across
// monthly installments. The schedule uses a fixed 30-day stride and the
// per-installment amount is the 2-decimal rounding of total/count; the sum
// of a schedule can therefore fall short of the requested total (see the
// scheduler tests), which matches the payroll system this replaces.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// MONEY ROUNDING
// ============================================================================

/// Round a monetary value to 2 decimal digits.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// SCHEDULE ERROR
// ============================================================================

/// The scheduler's only failure mode: a precondition on its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInput(pub String);

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input: {}", self.0)
    }
}

impl std::error::Error for InvalidInput {}

// ============================================================================
// INSTALLMENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallmentState {
    /// Waiting for a payroll period to pick it up
    Pending,

    /// Already included in a deduction report; never goes back
    Deducted,
}

impl InstallmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentState::Pending => "Pending",
            InstallmentState::Deducted => "Deducted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(InstallmentState::Pending),
            "Deducted" => Some(InstallmentState::Deducted),
            _ => None,
        }
    }
}

/// One scheduled partial deduction belonging to a salary advance.
///
/// Created in bulk by the scheduler, mutated only to flip state from
/// Pending to Deducted, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position within the schedule
    pub sequence_number: u32,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub state: InstallmentState,
}

impl Installment {
    pub fn is_pending(&self) -> bool {
        self.state == InstallmentState::Pending
    }

    /// One-way transition. Returns true if this call performed the flip,
    /// false if the installment was already deducted.
    pub fn mark_deducted(&mut self) -> bool {
        if self.state == InstallmentState::Deducted {
            return false;
        }
        self.state = InstallmentState::Deducted;
        true
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Generate the installment schedule for an advance.
///
/// Every installment carries round2(total/count) and falls 30 days after
/// the previous one, the first on start_date itself.
pub fn generate_schedule(
    total_amount: f64,
    installment_count: u32,
    start_date: NaiveDate,
) -> Result<Vec<Installment>, InvalidInput> {
    if installment_count < 1 {
        return Err(InvalidInput(format!(
            "installment count must be at least 1, got {}",
            installment_count
        )));
    }
    if total_amount <= 0.0 {
        return Err(InvalidInput(format!(
            "total amount must be positive, got {:.2}",
            total_amount
        )));
    }

    let per_installment = round2(total_amount / installment_count as f64);

    let installments = (1..=installment_count)
        .map(|n| Installment {
            sequence_number: n,
            due_date: start_date + Duration::days(30 * (n as i64 - 1)),
            amount: per_installment,
            state: InstallmentState::Pending,
        })
        .collect();

    Ok(installments)
}

// ============================================================================
// ADVANCE
// ============================================================================

/// An employer-issued early payment of salary plus its recovery schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advance {
    pub employee_cpf: String,
    pub request_date: NaiveDate,
    pub total_amount: f64,
    pub installment_count: u32,
    pub installments: Vec<Installment>,
}

impl Advance {
    /// Approve an advance request: validates the inputs and generates the
    /// schedule in one step. Deductions start on the request date.
    pub fn approve(
        employee_cpf: &str,
        request_date: NaiveDate,
        total_amount: f64,
        installment_count: u32,
    ) -> Result<Advance, InvalidInput> {
        let installments = generate_schedule(total_amount, installment_count, request_date)?;

        Ok(Advance {
            employee_cpf: employee_cpf.to_string(),
            request_date,
            total_amount,
            installment_count,
            installments,
        })
    }

    /// Sum of the scheduled amounts (can differ from total_amount, see the
    /// module header).
    pub fn scheduled_total(&self) -> f64 {
        round2(self.installments.iter().map(|i| i.amount).sum())
    }

    /// True once every installment has been deducted.
    pub fn is_settled(&self) -> bool {
        self.installments.iter().all(|i| !i.is_pending())
    }
}

// ============================================================================
// TESTS
// ============================================================================
