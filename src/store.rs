// 🗃️ Store - role-gated operations over the database
//
// The counterpart of the form handlers in the application this serves:
// each operation checks the actor's role, validates, mutates and appends
// one audit event. Reads stay on the plain db functions.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

use crate::advance::Advance;
use crate::audit::AuditEvent;
use crate::cpf::is_valid_cpf;
use crate::db;
use crate::entities::contract::{Contract, SalaryAdjustment};
use crate::entities::dependent::Dependent;
use crate::entities::dismissal::Dismissal;
use crate::entities::employee::{Employee, EmployeeRegistry};
use crate::entities::vacation::VacationRecord;
use crate::timeclock::{ImportSummary, TimeclockRegistry};
use crate::users::ActorContext;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        db::setup_database(&conn)?;
        Ok(Store { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::setup_database(&conn)?;
        Ok(Store { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ------------------------------------------------------------------------
    // Employees
    // ------------------------------------------------------------------------

    /// Master only. Validates the CPF and the payment route before insert.
    pub fn add_employee(&mut self, actor: &ActorContext, employee: &Employee) -> Result<()> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        if !is_valid_cpf(&employee.cpf) {
            anyhow::bail!("invalid CPF: {}", employee.cpf);
        }
        if !employee.has_payment_route() {
            anyhow::bail!("payment route required: a PIX key or the complete bank details");
        }
        if db::get_employee(&self.conn, &employee.cpf)?.is_some() {
            anyhow::bail!("CPF already registered: {}", employee.cpf);
        }

        db::insert_employee(&self.conn, employee)?;

        let event = AuditEvent::new(
            actor,
            &format!("Employee {} ({}) added.", employee.name, employee.cpf),
            "employees",
            &employee.cpf,
        )
        .with_change(None, Some(serde_json::to_value(employee)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dependents
    // ------------------------------------------------------------------------

    /// Master only. The dependent's own CPF must be valid and the linked
    /// employee must exist.
    pub fn add_dependent(&mut self, actor: &ActorContext, dependent: &Dependent) -> Result<()> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        if !is_valid_cpf(&dependent.cpf) {
            anyhow::bail!("invalid dependent CPF: {}", dependent.cpf);
        }
        let employee = db::get_employee(&self.conn, &dependent.employee_cpf)?
            .ok_or_else(|| anyhow!("employee not found: {}", dependent.employee_cpf))?;

        db::insert_dependent(&self.conn, dependent)?;

        let event = AuditEvent::new(
            actor,
            &format!(
                "Dependent {} added for {} ({}).",
                dependent.name, employee.name, employee.cpf
            ),
            "dependents",
            &dependent.cpf,
        )
        .with_change(None, Some(serde_json::to_value(dependent)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Contracts
    // ------------------------------------------------------------------------

    /// Master only. One active contract per employee is enforced below.
    pub fn add_contract(&mut self, actor: &ActorContext, contract: &Contract) -> Result<i64> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        let employee = db::get_employee(&self.conn, &contract.employee_cpf)?
            .ok_or_else(|| anyhow!("employee not found: {}", contract.employee_cpf))?;

        let id = db::insert_contract(&self.conn, contract)?;

        let event = AuditEvent::new(
            actor,
            &format!(
                "Contract added for {} ({}).",
                employee.name, employee.cpf
            ),
            "contracts",
            &id.to_string(),
        )
        .with_change(None, Some(serde_json::to_value(contract)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(id)
    }

    /// Master only. Records a percentage adjustment.
    pub fn add_adjustment(
        &mut self,
        actor: &ActorContext,
        adjustment: &SalaryAdjustment,
    ) -> Result<i64> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        if db::get_employee(&self.conn, &adjustment.employee_cpf)?.is_none() {
            anyhow::bail!("employee not found: {}", adjustment.employee_cpf);
        }

        let id = db::insert_adjustment(&self.conn, adjustment)?;

        let event = AuditEvent::new(
            actor,
            &format!("Salary adjustment added for {}.", adjustment.employee_cpf),
            "salary_adjustments",
            &id.to_string(),
        )
        .with_change(None, Some(serde_json::to_value(adjustment)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Vacations
    // ------------------------------------------------------------------------

    /// Master only. Applies the date-ordering rules before insert.
    pub fn add_vacation(&mut self, actor: &ActorContext, record: &VacationRecord) -> Result<i64> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        if db::get_employee(&self.conn, &record.employee_cpf)?.is_none() {
            anyhow::bail!("employee not found: {}", record.employee_cpf);
        }
        record.validate().map_err(|e| anyhow!(e))?;

        let id = db::insert_vacation(&self.conn, record)?;

        let event = AuditEvent::new(
            actor,
            &format!("Vacation record added for {}.", record.employee_cpf),
            "vacations",
            &id.to_string(),
        )
        .with_change(None, Some(serde_json::to_value(record)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Dismissals
    // ------------------------------------------------------------------------

    /// Master only. Validates the reason, checks the dismissal date against
    /// the active contract and closes that contract.
    pub fn register_dismissal(
        &mut self,
        actor: &ActorContext,
        dismissal: &Dismissal,
    ) -> Result<i64> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        dismissal.validate().map_err(|e| anyhow!(e))?;

        if let Some(active) = db::get_active_contract(&self.conn, &dismissal.employee_cpf)? {
            if dismissal.dismissal_date < active.admission_date {
                anyhow::bail!(
                    "dismissal date cannot be earlier than the contract admission date"
                );
            }
            db::deactivate_contract(&self.conn, active.id, dismissal.dismissal_date)?;
        }

        let id = db::insert_dismissal(&self.conn, dismissal)?;

        let event = AuditEvent::new(
            actor,
            &format!("Dismissal registered for {}.", dismissal.employee_cpf),
            "dismissals",
            &id.to_string(),
        )
        .with_change(None, Some(serde_json::to_value(dismissal)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Advances
    // ------------------------------------------------------------------------

    /// Master only. Generates and persists the whole schedule.
    pub fn approve_advance(
        &mut self,
        actor: &ActorContext,
        employee_cpf: &str,
        request_date: NaiveDate,
        total_amount: f64,
        installment_count: u32,
    ) -> Result<i64> {
        actor.require_master().map_err(|e| anyhow!(e))?;

        let employee = db::get_employee(&self.conn, employee_cpf)?
            .ok_or_else(|| anyhow!("employee not found: {}", employee_cpf))?;

        let advance = Advance::approve(
            &employee.cpf,
            request_date,
            total_amount,
            installment_count,
        )?;
        let id = db::insert_advance(&mut self.conn, &advance)?;

        let event = AuditEvent::new(
            actor,
            &format!(
                "Advance of {:.2} in {} installments approved for {} ({}).",
                total_amount, installment_count, employee.name, employee.cpf
            ),
            "advances",
            &id.to_string(),
        )
        .with_change(
            None,
            Some(json!({
                "total_amount": total_amount,
                "installment_count": installment_count,
                "request_date": request_date.format("%Y-%m-%d").to_string(),
            })),
        );
        db::insert_audit_event(&self.conn, &event)?;

        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Time clock
    // ------------------------------------------------------------------------

    /// Any authenticated user. Imports an AFD file, matches identifiers
    /// against the employees on file and persists the punches.
    pub fn import_afd(&mut self, actor: &ActorContext, path: &Path) -> Result<ImportSummary> {
        let employees = EmployeeRegistry::load(db::get_all_employees(&self.conn)?);

        let mut timeclock = TimeclockRegistry::new();
        let mut summary = timeclock.import_afd_file(path, &employees)?;

        // Rows already persisted by an earlier import count as duplicates
        let (inserted, already_known) = db::insert_punches(&self.conn, timeclock.all())?;
        summary.inserted = inserted;
        summary.duplicates += already_known;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.afd");
        let event = AuditEvent::new(
            actor,
            &format!(
                "AFD file {} imported: {} punches.",
                filename, summary.inserted
            ),
            "punches",
            filename,
        )
        .with_change(None, Some(serde_json::to_value(&summary)?));
        db::insert_audit_event(&self.conn, &event)?;

        Ok(summary)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Role;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn master() -> ActorContext {
        ActorContext::new(1, "ana", Role::Master)
    }

    fn standard() -> ActorContext {
        ActorContext::new(2, "rui", Role::Standard)
    }

    fn employee() -> Employee {
        let mut e = Employee::new("11144477735", "Maria Souza", date(1990, 5, 20));
        e.pix_key = Some("maria@example.com".to_string());
        e
    }

    #[test]
    fn test_add_employee_writes_audit_event() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();

        let events = db::get_audit_events_for(store.conn(), "employees", "11144477735").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor, "ana");
        assert!(events[0].action.contains("Maria Souza"));
        assert!(events[0].new_data.is_some());
    }

    #[test]
    fn test_standard_actor_is_rejected() {
        let mut store = Store::open_in_memory().unwrap();
        let err = store.add_employee(&standard(), &employee()).unwrap_err();
        assert!(err.to_string().contains("access denied"));

        // Nothing was written
        assert!(db::get_employee(store.conn(), "11144477735")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_add_employee_rejects_bad_cpf() {
        let mut store = Store::open_in_memory().unwrap();
        let mut e = employee();
        e.cpf = "12345678900".to_string();

        assert!(store.add_employee(&master(), &e).is_err());
    }

    #[test]
    fn test_dependent_requires_employee_on_file() {
        let mut store = Store::open_in_memory().unwrap();

        let dependent =
            Dependent::new("52998224725", "João Souza", date(2015, 3, 2), "11144477735");
        assert!(store.add_dependent(&master(), &dependent).is_err());

        store.add_employee(&master(), &employee()).unwrap();
        store.add_dependent(&master(), &dependent).unwrap();
    }

    #[test]
    fn test_dismissal_closes_contract_and_logs() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();
        store
            .add_contract(
                &master(),
                &Contract::new(
                    "11144477735",
                    "Production",
                    "Machine Operator",
                    2400.0,
                    "CLT",
                    date(2023, 1, 2),
                ),
            )
            .unwrap();

        let dismissal = Dismissal::new(
            "11144477735",
            date(2024, 5, 10),
            date(2024, 5, 10),
            "Without cause",
            "Repeated unjustified absences over three consecutive months despite warnings.",
            "Paid out",
        );
        let id = store.register_dismissal(&master(), &dismissal).unwrap();

        assert!(db::get_active_contract(store.conn(), "11144477735")
            .unwrap()
            .is_none());
        let events =
            db::get_audit_events_for(store.conn(), "dismissals", &id.to_string()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_approve_advance_persists_schedule() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();

        let id = store
            .approve_advance(&master(), "111.444.777-35", date(2024, 1, 10), 300.0, 3)
            .unwrap();

        let installments = db::get_installments_of(store.conn(), id).unwrap();
        assert_eq!(installments.len(), 3);

        let events = db::get_audit_events_for(store.conn(), "advances", &id.to_string()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_approve_advance_rejects_bad_input() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();

        assert!(store
            .approve_advance(&master(), "11144477735", date(2024, 1, 10), -5.0, 3)
            .is_err());
        assert!(store
            .approve_advance(&master(), "11144477735", date(2024, 1, 10), 300.0, 0)
            .is_err());
    }

    #[test]
    fn test_vacation_rules_applied() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();

        let bad = VacationRecord::new("11144477735", date(2024, 1, 1), date(2024, 1, 1));
        assert!(store.add_vacation(&master(), &bad).is_err());

        let good = VacationRecord::new("11144477735", date(2023, 1, 2), date(2024, 1, 1));
        store.add_vacation(&master(), &good).unwrap();
    }

    #[test]
    fn test_import_afd_end_to_end() {
        let mut store = Store::open_in_memory().unwrap();
        store.add_employee(&master(), &employee()).unwrap();

        let dir = std::env::temp_dir();
        let path = dir.join("hr_registry_store_test.afd");
        std::fs::write(
            &path,
            format!("{:09}3{}{:<12}\n", 1, "150120240830", "11144477735"),
        )
        .unwrap();

        let summary = store.import_afd(&standard(), &path).unwrap();
        assert_eq!(summary.inserted, 1);

        // Re-import: the database already has the punch
        let again = store.import_afd(&standard(), &path).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 1);

        let punches = db::get_all_punches(store.conn()).unwrap();
        assert_eq!(punches.len(), 1);
        assert_eq!(punches[0].employee_cpf.as_deref(), Some("11144477735"));

        std::fs::remove_file(&path).ok();
    }
}
