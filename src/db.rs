use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::advance::{Advance, Installment, InstallmentState};
use crate::audit::AuditEvent;
use crate::entities::contract::{Contract, SalaryAdjustment};
use crate::entities::dependent::Dependent;
use crate::entities::dismissal::{Dismissal, DismissalClassification};
use crate::entities::employee::{Employee, EmployeeStatus};
use crate::entities::vacation::VacationRecord;
use crate::timeclock::{PunchKind, PunchRecord};
use crate::users::{Role, User};

// ============================================================================
// DATE ENCODING
// ============================================================================
// Dates live in TEXT columns: NaiveDate as %Y-%m-%d, NaiveDateTime as
// %Y-%m-%d %H:%M:%S, DateTime<Utc> as RFC 3339.

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn date_str(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|_| rusqlite::Error::InvalidQuery)
}

fn parse_datetime(s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).map_err(|_| rusqlite::Error::InvalidQuery)
}

fn parse_utc(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| rusqlite::Error::InvalidQuery)
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS employees (
            cpf TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            sex TEXT,
            pis TEXT UNIQUE,
            face_id TEXT UNIQUE,
            address TEXT,
            district TEXT,
            city TEXT,
            state TEXT,
            postal_code TEXT,
            phone TEXT,
            education_level TEXT,
            bank_code TEXT,
            bank_name TEXT,
            branch_code TEXT,
            account_number TEXT,
            account_variant TEXT,
            pix_key TEXT,
            notes TEXT,
            status TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS dependents (
            cpf TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            family_allowance REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contracts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            sector TEXT NOT NULL,
            role TEXT NOT NULL,
            shift_schedule_id INTEGER,
            starting_salary REAL NOT NULL,
            bonus REAL NOT NULL DEFAULT 0,
            hiring_regime TEXT NOT NULL,
            admission_date TEXT NOT NULL,
            termination_date TEXT,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS salary_adjustments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            effective_date TEXT NOT NULL,
            salary_pct REAL NOT NULL,
            bonus_pct REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vacations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            accrual_start TEXT NOT NULL,
            accrual_end TEXT NOT NULL,
            taken_start TEXT,
            taken_end TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS dismissals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            dismissal_date TEXT NOT NULL,
            last_worked_day TEXT NOT NULL,
            termination_kind TEXT NOT NULL,
            classification TEXT NOT NULL DEFAULT 'Neutral',
            reason TEXT NOT NULL,
            notice_type TEXT NOT NULL,
            notice_date TEXT,
            notice_days INTEGER,
            notice_end_date TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS advances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_cpf TEXT NOT NULL REFERENCES employees(cpf),
            request_date TEXT NOT NULL,
            total_amount REAL NOT NULL,
            installment_count INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS installments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            advance_id INTEGER NOT NULL REFERENCES advances(id),
            sequence_number INTEGER NOT NULL,
            due_date TEXT NOT NULL,
            amount REAL NOT NULL,
            state TEXT NOT NULL DEFAULT 'Pending'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS punches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            employee_cpf TEXT,
            pis TEXT,
            face_id TEXT,
            identifier TEXT NOT NULL,
            punched_at TEXT NOT NULL,
            kind TEXT NOT NULL,
            note TEXT,
            source_file TEXT NOT NULL,
            line_number INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            code INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            full_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            affected_table TEXT NOT NULL,
            record_id TEXT NOT NULL,
            old_data TEXT,
            new_data TEXT,
            actor_code INTEGER NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contracts_employee ON contracts(employee_cpf, active)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_installments_due ON installments(state, due_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_punches_employee ON punches(employee_cpf, punched_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_record ON audit_events(affected_table, record_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// EMPLOYEES
// ============================================================================

pub fn insert_employee(conn: &Connection, employee: &Employee) -> Result<()> {
    conn.execute(
        "INSERT INTO employees (
            cpf, name, birth_date, sex, pis, face_id, address, district, city,
            state, postal_code, phone, education_level, bank_code, bank_name,
            branch_code, account_number, account_variant, pix_key, notes, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                  ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            employee.cpf,
            employee.name,
            date_str(employee.birth_date),
            employee.sex,
            employee.pis,
            employee.face_id,
            employee.address,
            employee.district,
            employee.city,
            employee.state,
            employee.postal_code,
            employee.phone,
            employee.education_level,
            employee.bank_code,
            employee.bank_name,
            employee.branch_code,
            employee.account_number,
            employee.account_variant,
            employee.pix_key,
            employee.notes,
            employee.status.as_str(),
        ],
    )
    .with_context(|| format!("Failed to insert employee {}", employee.cpf))?;

    Ok(())
}

const EMPLOYEE_COLUMNS: &str = "cpf, name, birth_date, sex, pis, face_id, address, district, \
     city, state, postal_code, phone, education_level, bank_code, bank_name, branch_code, \
     account_number, account_variant, pix_key, notes, status";

fn employee_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Employee> {
    let birth_date: String = row.get(2)?;
    let status: String = row.get(20)?;

    Ok(Employee {
        cpf: row.get(0)?,
        name: row.get(1)?,
        birth_date: parse_date(&birth_date)?,
        sex: row.get(3)?,
        pis: row.get(4)?,
        face_id: row.get(5)?,
        address: row.get(6)?,
        district: row.get(7)?,
        city: row.get(8)?,
        state: row.get(9)?,
        postal_code: row.get(10)?,
        phone: row.get(11)?,
        education_level: row.get(12)?,
        bank_code: row.get(13)?,
        bank_name: row.get(14)?,
        branch_code: row.get(15)?,
        account_number: row.get(16)?,
        account_variant: row.get(17)?,
        pix_key: row.get(18)?,
        notes: row.get(19)?,
        status: EmployeeStatus::parse(&status).unwrap_or(EmployeeStatus::Active),
    })
}

pub fn get_employee(conn: &Connection, cpf: &str) -> Result<Option<Employee>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM employees WHERE cpf = ?1",
        EMPLOYEE_COLUMNS
    ))?;

    let mut rows = stmt.query_map(params![cpf], employee_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn get_all_employees(conn: &Connection) -> Result<Vec<Employee>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM employees ORDER BY name",
        EMPLOYEE_COLUMNS
    ))?;

    let employees = stmt
        .query_map([], employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(employees)
}

// ============================================================================
// DEPENDENTS
// ============================================================================

pub fn insert_dependent(conn: &Connection, dependent: &Dependent) -> Result<()> {
    conn.execute(
        "INSERT INTO dependents (cpf, name, birth_date, active, employee_cpf, family_allowance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            dependent.cpf,
            dependent.name,
            date_str(dependent.birth_date),
            dependent.active as i64,
            dependent.employee_cpf,
            dependent.family_allowance,
        ],
    )
    .with_context(|| format!("Failed to insert dependent {}", dependent.cpf))?;

    Ok(())
}

pub fn get_dependents_of(conn: &Connection, employee_cpf: &str) -> Result<Vec<Dependent>> {
    let mut stmt = conn.prepare(
        "SELECT cpf, name, birth_date, active, employee_cpf, family_allowance
         FROM dependents WHERE employee_cpf = ?1 ORDER BY name",
    )?;

    let dependents = stmt
        .query_map(params![employee_cpf], |row| {
            let birth_date: String = row.get(2)?;
            let active: i64 = row.get(3)?;
            Ok(Dependent {
                cpf: row.get(0)?,
                name: row.get(1)?,
                birth_date: parse_date(&birth_date)?,
                active: active != 0,
                employee_cpf: row.get(4)?,
                family_allowance: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dependents)
}

// ============================================================================
// CONTRACTS
// ============================================================================

const CONTRACT_COLUMNS: &str = "id, employee_cpf, sector, role, shift_schedule_id, \
     starting_salary, bonus, hiring_regime, admission_date, termination_date, active";

/// Insert a contract, enforcing the one-active-contract rule.
pub fn insert_contract(conn: &Connection, contract: &Contract) -> Result<i64> {
    if contract.active {
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM contracts WHERE employee_cpf = ?1 AND active = 1",
            params![contract.employee_cpf],
            |row| row.get(0),
        )?;
        if existing > 0 {
            anyhow::bail!(
                "employee {} already has an active contract",
                contract.employee_cpf
            );
        }
    }

    conn.execute(
        "INSERT INTO contracts (
            employee_cpf, sector, role, shift_schedule_id, starting_salary,
            bonus, hiring_regime, admission_date, termination_date, active
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            contract.employee_cpf,
            contract.sector,
            contract.role,
            contract.shift_schedule_id,
            contract.starting_salary,
            contract.bonus,
            contract.hiring_regime,
            date_str(contract.admission_date),
            contract.termination_date.map(date_str),
            contract.active as i64,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn contract_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contract> {
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
        admission_date: parse_date(&admission)?,
        termination_date: match termination {
            Some(s) => Some(parse_date(&s)?),
            None => None,
        },
        active: active != 0,
    })
}

/// The employee's active contract with the most recent admission date.
pub fn get_active_contract(conn: &Connection, employee_cpf: &str) -> Result<Option<Contract>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM contracts
         WHERE employee_cpf = ?1 AND active = 1
         ORDER BY admission_date DESC LIMIT 1",
        CONTRACT_COLUMNS
    ))?;

    let mut rows = stmt.query_map(params![employee_cpf], contract_from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn deactivate_contract(
    conn: &Connection,
    contract_id: i64,
    termination_date: NaiveDate,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE contracts SET active = 0, termination_date = ?1 WHERE id = ?2",
        params![date_str(termination_date), contract_id],
    )?;

    if updated == 0 {
        anyhow::bail!("contract not found: {}", contract_id);
    }
    Ok(())
}

// ============================================================================
// SALARY ADJUSTMENTS
// ============================================================================

pub fn insert_adjustment(conn: &Connection, adjustment: &SalaryAdjustment) -> Result<i64> {
    conn.execute(
        "INSERT INTO salary_adjustments (employee_cpf, effective_date, salary_pct, bonus_pct)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            adjustment.employee_cpf,
            date_str(adjustment.effective_date),
            adjustment.salary_pct,
            adjustment.bonus_pct,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_adjustments_of(conn: &Connection, employee_cpf: &str) -> Result<Vec<SalaryAdjustment>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_cpf, effective_date, salary_pct, bonus_pct
         FROM salary_adjustments WHERE employee_cpf = ?1 ORDER BY effective_date",
    )?;

    let adjustments = stmt
        .query_map(params![employee_cpf], |row| {
            let effective: String = row.get(2)?;
            Ok(SalaryAdjustment {
                id: row.get(0)?,
                employee_cpf: row.get(1)?,
                effective_date: parse_date(&effective)?,
                salary_pct: row.get(3)?,
                bonus_pct: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(adjustments)
}

// ============================================================================
// VACATIONS
// ============================================================================

pub fn insert_vacation(conn: &Connection, record: &VacationRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO vacations (employee_cpf, accrual_start, accrual_end, taken_start, taken_end)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.employee_cpf,
            date_str(record.accrual_start),
            date_str(record.accrual_end),
            record.taken_start.map(date_str),
            record.taken_end.map(date_str),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_vacations_of(conn: &Connection, employee_cpf: &str) -> Result<Vec<VacationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_cpf, accrual_start, accrual_end, taken_start, taken_end
         FROM vacations WHERE employee_cpf = ?1 ORDER BY accrual_start DESC",
    )?;

    let records = stmt
        .query_map(params![employee_cpf], |row| {
            let accrual_start: String = row.get(2)?;
            let accrual_end: String = row.get(3)?;
            let taken_start: Option<String> = row.get(4)?;
            let taken_end: Option<String> = row.get(5)?;
            Ok(VacationRecord {
                id: row.get(0)?,
                employee_cpf: row.get(1)?,
                accrual_start: parse_date(&accrual_start)?,
                accrual_end: parse_date(&accrual_end)?,
                taken_start: match taken_start {
                    Some(s) => Some(parse_date(&s)?),
                    None => None,
                },
                taken_end: match taken_end {
                    Some(s) => Some(parse_date(&s)?),
                    None => None,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

// ============================================================================
// DISMISSALS
// ============================================================================

pub fn insert_dismissal(conn: &Connection, dismissal: &Dismissal) -> Result<i64> {
    conn.execute(
        "INSERT INTO dismissals (
            employee_cpf, dismissal_date, last_worked_day, termination_kind,
            classification, reason, notice_type, notice_date, notice_days, notice_end_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            dismissal.employee_cpf,
            date_str(dismissal.dismissal_date),
            date_str(dismissal.last_worked_day),
            dismissal.termination_kind,
            dismissal.classification.as_str(),
            dismissal.reason,
            dismissal.notice_type,
            dismissal.notice_date.map(date_str),
            dismissal.notice_days,
            dismissal.notice_end_date.map(date_str),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_dismissals_of(conn: &Connection, employee_cpf: &str) -> Result<Vec<Dismissal>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_cpf, dismissal_date, last_worked_day, termination_kind,
                classification, reason, notice_type, notice_date, notice_days, notice_end_date
         FROM dismissals WHERE employee_cpf = ?1 ORDER BY dismissal_date DESC",
    )?;

    let dismissals = stmt
        .query_map(params![employee_cpf], |row| {
            let dismissal_date: String = row.get(2)?;
            let last_worked: String = row.get(3)?;
            let classification: String = row.get(5)?;
            let notice_date: Option<String> = row.get(8)?;
            let notice_end: Option<String> = row.get(10)?;
            Ok(Dismissal {
                id: row.get(0)?,
                employee_cpf: row.get(1)?,
                dismissal_date: parse_date(&dismissal_date)?,
                last_worked_day: parse_date(&last_worked)?,
                termination_kind: row.get(4)?,
                classification: DismissalClassification::parse(&classification)
                    .unwrap_or(DismissalClassification::Neutral),
                reason: row.get(6)?,
                notice_type: row.get(7)?,
                notice_date: match notice_date {
                    Some(s) => Some(parse_date(&s)?),
                    None => None,
                },
                notice_days: row.get(9)?,
                notice_end_date: match notice_end {
                    Some(s) => Some(parse_date(&s)?),
                    None => None,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dismissals)
}

// ============================================================================
// ADVANCES & INSTALLMENTS
// ============================================================================

/// An installment row with its database identity.
#[derive(Debug, Clone)]
pub struct StoredInstallment {
    pub id: i64,
    pub advance_id: i64,
    pub installment: Installment,
}

/// Insert an advance and its whole schedule in one transaction.
pub fn insert_advance(conn: &mut Connection, advance: &Advance) -> Result<i64> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO advances (employee_cpf, request_date, total_amount, installment_count)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            advance.employee_cpf,
            date_str(advance.request_date),
            advance.total_amount,
            advance.installment_count,
        ],
    )?;
    let advance_id = tx.last_insert_rowid();

    for installment in &advance.installments {
        tx.execute(
            "INSERT INTO installments (advance_id, sequence_number, due_date, amount, state)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                advance_id,
                installment.sequence_number,
                date_str(installment.due_date),
                installment.amount,
                installment.state.as_str(),
            ],
        )?;
    }

    tx.commit()?;
    Ok(advance_id)
}

fn installment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredInstallment> {
    let due_date: String = row.get(3)?;
    let state: String = row.get(5)?;

    Ok(StoredInstallment {
        id: row.get(0)?,
        advance_id: row.get(1)?,
        installment: Installment {
            sequence_number: row.get(2)?,
            due_date: parse_date(&due_date)?,
            amount: row.get(4)?,
            state: InstallmentState::parse(&state).unwrap_or(InstallmentState::Pending),
        },
    })
}

pub fn get_installments_of(conn: &Connection, advance_id: i64) -> Result<Vec<StoredInstallment>> {
    let mut stmt = conn.prepare(
        "SELECT id, advance_id, sequence_number, due_date, amount, state
         FROM installments WHERE advance_id = ?1 ORDER BY sequence_number",
    )?;

    let installments = stmt
        .query_map(params![advance_id], installment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(installments)
}

/// Pending installments due on or before the given date - the payroll
/// deduction queue.
pub fn get_pending_installments_due(
    conn: &Connection,
    through: NaiveDate,
) -> Result<Vec<StoredInstallment>> {
    let mut stmt = conn.prepare(
        "SELECT id, advance_id, sequence_number, due_date, amount, state
         FROM installments
         WHERE state = 'Pending' AND due_date <= ?1
         ORDER BY due_date, id",
    )?;

    let installments = stmt
        .query_map(params![date_str(through)], installment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(installments)
}

/// Flip one installment to Deducted. Returns false when it was already
/// deducted (or doesn't exist), so re-processing never double-counts.
pub fn mark_installment_deducted(conn: &Connection, installment_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE installments SET state = 'Deducted' WHERE id = ?1 AND state = 'Pending'",
        params![installment_id],
    )?;
    Ok(updated == 1)
}

// ============================================================================
// PUNCHES
// ============================================================================

/// Insert punches, skipping rows whose idempotency hash is already on
/// file. Returns (inserted, duplicates).
pub fn insert_punches(conn: &Connection, punches: &[PunchRecord]) -> Result<(usize, usize)> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for punch in punches {
        let result = conn.execute(
            "INSERT INTO punches (
                idempotency_hash, employee_cpf, pis, face_id, identifier,
                punched_at, kind, note, source_file, line_number
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                punch.idempotency_hash(),
                punch.employee_cpf,
                punch.pis,
                punch.face_id,
                punch.identifier,
                punch.punched_at.format(DATETIME_FMT).to_string(),
                punch.kind.as_str(),
                punch.note,
                punch.source_file,
                punch.line_number as i64,
            ],
        );

        match result {
            Ok(_) => inserted += 1,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok((inserted, duplicates))
}

pub fn get_all_punches(conn: &Connection) -> Result<Vec<PunchRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_cpf, pis, face_id, identifier, punched_at, kind,
                note, source_file, line_number
         FROM punches ORDER BY punched_at DESC",
    )?;

    let punches = stmt
        .query_map([], |row| {
            let punched_at: String = row.get(5)?;
            let kind: String = row.get(6)?;
            Ok(PunchRecord {
                id: row.get(0)?,
                employee_cpf: row.get(1)?,
                pis: row.get(2)?,
                face_id: row.get(3)?,
                identifier: row.get(4)?,
                punched_at: parse_datetime(&punched_at)?,
                kind: PunchKind::parse(&kind).unwrap_or(PunchKind::Manual),
                note: row.get(7)?,
                source_file: row.get(8)?,
                line_number: row.get::<_, i64>(9)? as usize,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(punches)
}

// ============================================================================
// USERS
// ============================================================================

pub fn insert_user(conn: &Connection, user: &User) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, full_name, password_hash, role)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            user.username,
            user.full_name,
            user.password_hash,
            user.role.as_str(),
        ],
    )
    .with_context(|| format!("Failed to insert user {}", user.username))?;

    Ok(conn.last_insert_rowid())
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT code, username, full_name, password_hash, role
         FROM users WHERE username = ?1",
    )?;

    let mut rows = stmt.query_map(params![username], |row| {
        let role: String = row.get(4)?;
        Ok(User {
            code: row.get(0)?,
            username: row.get(1)?,
            full_name: row.get(2)?,
            password_hash: row.get(3)?,
            role: Role::parse(&role).unwrap_or(Role::Standard),
        })
    })?;

    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

const AUDIT_COLUMNS: &str =
    "event_id, timestamp, action, affected_table, record_id, old_data, new_data, actor_code, actor";

pub fn insert_audit_event(conn: &Connection, event: &AuditEvent) -> Result<()> {
    let old_json = event
        .old_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let new_json = event
        .new_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO audit_events (
            event_id, timestamp, action, affected_table, record_id,
            old_data, new_data, actor_code, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.action,
            event.affected_table,
            event.record_id,
            old_json,
            new_json,
            event.actor_code,
            event.actor,
        ],
    )?;

    Ok(())
}

fn audit_event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let timestamp: String = row.get(1)?;
    let old_json: Option<String> = row.get(5)?;
    let new_json: Option<String> = row.get(6)?;

    Ok(AuditEvent {
        event_id: row.get(0)?,
        timestamp: parse_utc(&timestamp)?,
        action: row.get(2)?,
        affected_table: row.get(3)?,
        record_id: row.get(4)?,
        old_data: old_json.and_then(|s| serde_json::from_str(&s).ok()),
        new_data: new_json.and_then(|s| serde_json::from_str(&s).ok()),
        actor_code: row.get(7)?,
        actor: row.get(8)?,
    })
}

/// Events touching one record, newest first.
pub fn get_audit_events_for(
    conn: &Connection,
    affected_table: &str,
    record_id: &str,
) -> Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM audit_events
         WHERE affected_table = ?1 AND record_id = ?2
         ORDER BY timestamp DESC",
        AUDIT_COLUMNS
    ))?;

    let events = stmt
        .query_map(params![affected_table, record_id], audit_event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

pub fn get_audit_events_between(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<AuditEvent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM audit_events
         WHERE timestamp >= ?1 AND timestamp <= ?2
         ORDER BY timestamp",
        AUDIT_COLUMNS
    ))?;

    let events = stmt
        .query_map(
            params![from.to_rfc3339(), to.to_rfc3339()],
            audit_event_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::ActorContext;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn employee() -> Employee {
        let mut e = Employee::new("11144477735", "Maria Souza", date(1990, 5, 20));
        e.pix_key = Some("maria@example.com".to_string());
        e.pis = Some("12056412547".to_string());
        e
    }

    #[test]
    fn test_employee_round_trip() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let loaded = get_employee(&conn, "11144477735").unwrap().unwrap();
        assert_eq!(loaded.name, "Maria Souza");
        assert_eq!(loaded.birth_date, date(1990, 5, 20));
        assert_eq!(loaded.pix_key.as_deref(), Some("maria@example.com"));
        assert_eq!(loaded.status, EmployeeStatus::Active);

        assert!(get_employee(&conn, "52998224725").unwrap().is_none());
        assert_eq!(get_all_employees(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_employee_cpf_rejected() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();
        assert!(insert_employee(&conn, &employee()).is_err());
    }

    #[test]
    fn test_dependent_round_trip() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let mut dependent =
            Dependent::new("52998224725", "João Souza", date(2015, 3, 2), "11144477735");
        dependent.family_allowance = 59.82;
        insert_dependent(&conn, &dependent).unwrap();

        let dependents = get_dependents_of(&conn, "11144477735").unwrap();
        assert_eq!(dependents.len(), 1);
        assert!((dependents[0].family_allowance - 59.82).abs() < 1e-9);
        assert!(dependents[0].active);
    }

    #[test]
    fn test_contract_one_active_rule() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let contract = Contract::new(
            "11144477735",
            "Production",
            "Machine Operator",
            2400.0,
            "CLT",
            date(2023, 1, 2),
        );
        let id = insert_contract(&conn, &contract).unwrap();
        assert!(id > 0);

        let err = insert_contract(&conn, &contract).unwrap_err();
        assert!(err.to_string().contains("already has an active contract"));

        deactivate_contract(&conn, id, date(2024, 5, 10)).unwrap();
        assert!(get_active_contract(&conn, "11144477735").unwrap().is_none());

        // A new active contract is allowed after deactivation
        insert_contract(&conn, &contract).unwrap();
        let active = get_active_contract(&conn, "11144477735").unwrap().unwrap();
        assert_eq!(active.sector, "Production");
    }

    #[test]
    fn test_adjustments_ordered_by_date() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        insert_adjustment(
            &conn,
            &SalaryAdjustment::new("11144477735", date(2024, 6, 1), 5.0, 0.0),
        )
        .unwrap();
        insert_adjustment(
            &conn,
            &SalaryAdjustment::new("11144477735", date(2024, 1, 1), 10.0, 0.0),
        )
        .unwrap();

        let adjustments = get_adjustments_of(&conn, "11144477735").unwrap();
        assert_eq!(adjustments.len(), 2);
        assert_eq!(adjustments[0].effective_date, date(2024, 1, 1));
    }

    #[test]
    fn test_vacation_round_trip() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let mut record = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        record.taken_start = Some(date(2023, 7, 10));
        record.taken_end = Some(date(2023, 8, 8));
        insert_vacation(&conn, &record).unwrap();

        let records = get_vacations_of(&conn, "11144477735").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].taken_start, Some(date(2023, 7, 10)));
    }

    #[test]
    fn test_dismissal_round_trip() {
        let conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let dismissal = Dismissal::new(
            "11144477735",
            date(2024, 5, 10),
            date(2024, 5, 10),
            "Without cause",
            "Repeated unjustified absences over three consecutive months despite warnings.",
            "Paid out",
        );
        insert_dismissal(&conn, &dismissal).unwrap();

        let dismissals = get_dismissals_of(&conn, "11144477735").unwrap();
        assert_eq!(dismissals.len(), 1);
        assert_eq!(
            dismissals[0].classification,
            DismissalClassification::Neutral
        );
    }

    #[test]
    fn test_advance_schedule_round_trip() {
        let mut conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let advance = Advance::approve("11144477735", date(2024, 1, 10), 300.0, 3).unwrap();
        let advance_id = insert_advance(&mut conn, &advance).unwrap();

        let installments = get_installments_of(&conn, advance_id).unwrap();
        assert_eq!(installments.len(), 3);
        assert_eq!(installments[0].installment.due_date, date(2024, 1, 10));
        assert_eq!(installments[1].installment.due_date, date(2024, 2, 9));
        assert!(installments
            .iter()
            .all(|i| i.installment.state == InstallmentState::Pending));
    }

    #[test]
    fn test_mark_deducted_is_idempotent() {
        let mut conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let advance = Advance::approve("11144477735", date(2024, 1, 10), 300.0, 3).unwrap();
        let advance_id = insert_advance(&mut conn, &advance).unwrap();
        let first_id = get_installments_of(&conn, advance_id).unwrap()[0].id;

        assert!(mark_installment_deducted(&conn, first_id).unwrap());
        // Second run finds nothing Pending - no double count
        assert!(!mark_installment_deducted(&conn, first_id).unwrap());

        let reloaded = get_installments_of(&conn, advance_id).unwrap();
        assert_eq!(reloaded[0].installment.state, InstallmentState::Deducted);
    }

    #[test]
    fn test_pending_installments_due_queue() {
        let mut conn = test_conn();
        insert_employee(&conn, &employee()).unwrap();

        let advance = Advance::approve("11144477735", date(2024, 1, 10), 300.0, 3).unwrap();
        insert_advance(&mut conn, &advance).unwrap();

        // Due 2024-01-10, 2024-02-09, 2024-03-10
        let due = get_pending_installments_due(&conn, date(2024, 2, 29)).unwrap();
        assert_eq!(due.len(), 2);

        mark_installment_deducted(&conn, due[0].id).unwrap();
        let remaining = get_pending_installments_due(&conn, date(2024, 2, 29)).unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_punch_insert_skips_duplicates() {
        let conn = test_conn();

        let punch = PunchRecord {
            id: 0,
            employee_cpf: Some("11144477735".to_string()),
            pis: None,
            face_id: None,
            identifier: "11144477735".to_string(),
            punched_at: date(2024, 1, 15).and_hms_opt(8, 30, 0).unwrap(),
            kind: PunchKind::AfdImport,
            note: None,
            source_file: "clock.afd".to_string(),
            line_number: 2,
        };

        let (inserted, duplicates) =
            insert_punches(&conn, &[punch.clone(), punch.clone()]).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(duplicates, 1);

        let punches = get_all_punches(&conn).unwrap();
        assert_eq!(punches.len(), 1);
        assert_eq!(punches[0].kind, PunchKind::AfdImport);
        assert_eq!(punches[0].punched_at, punch.punched_at);
    }

    #[test]
    fn test_user_round_trip() {
        let conn = test_conn();
        let user = User::new("ana", "Ana Lima", "s3cret", Role::Master);
        insert_user(&conn, &user).unwrap();

        let loaded = get_user_by_username(&conn, "ana").unwrap().unwrap();
        assert!(loaded.check_password("s3cret"));
        assert_eq!(loaded.role, Role::Master);
        assert!(get_user_by_username(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_audit_event_round_trip() {
        let conn = test_conn();
        let actor = ActorContext::new(1, "ana", Role::Master);

        let event = AuditEvent::new(&actor, "Employee added.", "employees", "11144477735")
            .with_change(None, Some(serde_json::json!({"name": "Maria Souza"})));
        insert_audit_event(&conn, &event).unwrap();

        let events = get_audit_events_for(&conn, "employees", "11144477735").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "ana");
        assert_eq!(
            events[0].new_data.as_ref().unwrap()["name"],
            serde_json::json!("Maria Souza")
        );

        let window = get_audit_events_between(
            &conn,
            Utc::now() - chrono::Duration::minutes(5),
            Utc::now() + chrono::Duration::minutes(5),
        )
        .unwrap();
        assert_eq!(window.len(), 1);
    }
}
