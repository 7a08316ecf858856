// 🧾 Reports - payroll deduction run, registration summary, CSV exports
//
// The deduction run is the payroll-side collaborator of the advance
// scheduler: it sweeps Pending installments due up to the period end,
// flips each to Deducted and reports what it took. Re-running a period
// deducts nothing twice because only Pending rows are picked up.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::advance::round2;
use crate::db;
use crate::entities::contract::Contract;
use crate::entities::dependent::Dependent;
use crate::entities::employee::Employee;
use crate::timeclock::PunchRecord;

// ============================================================================
// DEDUCTION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionLine {
    pub installment_id: i64,
    pub advance_id: i64,
    pub employee_cpf: String,
    pub sequence_number: u32,
    pub due_date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub lines: Vec<DeductionLine>,
}

impl DeductionReport {
    pub fn total(&self) -> f64 {
        round2(self.lines.iter().map(|l| l.amount).sum())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Run the deductions of one payroll period.
///
/// Picks every Pending installment due on or before period_end (overdue
/// ones from earlier periods are swept too) and flips it to Deducted.
/// The whole run commits atomically.
pub fn run_deductions(
    conn: &mut Connection,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<DeductionReport> {
    let tx = conn.transaction()?;
    let mut lines = Vec::new();

    {
        let mut stmt = tx.prepare(
            "SELECT i.id, i.advance_id, a.employee_cpf, i.sequence_number, i.due_date, i.amount
             FROM installments i
             JOIN advances a ON a.id = i.advance_id
             WHERE i.state = 'Pending' AND i.due_date <= ?1
             ORDER BY i.due_date, i.id",
        )?;

        let candidates = stmt
            .query_map(params![period_end.format("%Y-%m-%d").to_string()], |row| {
                let due: String = row.get(4)?;
                Ok(DeductionLine {
                    installment_id: row.get(0)?,
                    advance_id: row.get(1)?,
                    employee_cpf: row.get(2)?,
                    sequence_number: row.get(3)?,
                    due_date: NaiveDate::parse_from_str(&due, "%Y-%m-%d")
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    amount: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for line in candidates {
            // Only count the installments this run actually flipped
            if db::mark_installment_deducted(&tx, line.installment_id)? {
                lines.push(line);
            }
        }
    }

    tx.commit()?;

    Ok(DeductionReport {
        period_start,
        period_end,
        lines,
    })
}

/// Write the deduction report as CSV.
pub fn write_deduction_csv<W: Write>(report: &DeductionReport, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "employee_cpf",
        "advance_id",
        "installment",
        "due_date",
        "amount",
    ])?;

    for line in &report.lines {
        wtr.write_record([
            line.employee_cpf.clone(),
            line.advance_id.to_string(),
            line.sequence_number.to_string(),
            line.due_date.format("%Y-%m-%d").to_string(),
            format!("{:.2}", line.amount),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// PUNCH EXPORT
// ============================================================================

/// Export punches as CSV, unmatched ones with an empty CPF column.
pub fn write_punches_csv<W: Write>(punches: &[PunchRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "employee_cpf",
        "identifier",
        "punched_at",
        "kind",
        "source_file",
    ])?;

    for punch in punches {
        wtr.write_record([
            punch.employee_cpf.clone().unwrap_or_default(),
            punch.identifier.clone(),
            punch.punched_at.format("%Y-%m-%d %H:%M").to_string(),
            punch.kind.as_str().to_string(),
            punch.source_file.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

// ============================================================================
// REGISTRATION SUMMARY
// ============================================================================

/// Everything the registration-sheet report shows for one employee: the
/// record itself, the most recent contract and the dependents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeSummary {
    pub employee: Employee,
    pub latest_contract: Option<Contract>,
    pub dependents: Vec<Dependent>,
}

pub fn build_employee_summary(conn: &Connection, cpf: &str) -> Result<Option<EmployeeSummary>> {
    let employee = match db::get_employee(conn, cpf)? {
        Some(e) => e,
        None => return Ok(None),
    };

    // Most recent contract by admission date, active or not
    let mut stmt = conn.prepare(
        "SELECT id, employee_cpf, sector, role, shift_schedule_id, starting_salary,
                bonus, hiring_regime, admission_date, termination_date, active
         FROM contracts WHERE employee_cpf = ?1
         ORDER BY admission_date DESC LIMIT 1",
    )?;
    let latest_contract = stmt
        .query_map(params![employee.cpf], |row| {
            let admission: String = row.get(8)?;
            let termination: Option<String> = row.get(9)?;
            let active: i64 = row.get(10)?;
            Ok(Contract {
                id: row.get(0)?,
                employee_cpf: row.get(1)?,
                sector: row.get(2)?,
                role: row.get(3)?,
                shift_schedule_id: row.get(4)?,
                starting_salary: row.get(5)?,
                bonus: row.get(6)?,
                hiring_regime: row.get(7)?,
                admission_date: NaiveDate::parse_from_str(&admission, "%Y-%m-%d")
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                termination_date: match termination {
                    Some(s) => Some(
                        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                            .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    ),
                    None => None,
                },
                active: active != 0,
            })
        })?
        .next()
        .transpose()?;

    let dependents = db::get_dependents_of(conn, &employee.cpf)?;

    Ok(Some(EmployeeSummary {
        employee,
        latest_contract,
        dependents,
    }))
}

// ============================================================================
// TESTS
// ============================================================================
