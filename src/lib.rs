// HR Registry - Core Library
// Exposes all modules for use in the CLI and tests

pub mod cpf;
pub mod advance;      // Salary advances + installment scheduler
pub mod entities;     // Employees, dependents, contracts, vacations, dismissals
pub mod users;        // Operator accounts, roles, actor context
pub mod audit;        // Append-only audit trail
pub mod timeclock;    // Punch records + AFD import
pub mod exams;        // Occupational health exams
pub mod ppe;          // Uniforms & protective equipment
pub mod validation;   // Record quality checks
pub mod db;           // SQLite persistence
pub mod store;        // Role-gated operations (validate + mutate + audit)
pub mod reports;      // Deduction run + CSV exports

// Re-export commonly used types
pub use cpf::{format_cpf, is_valid_cpf, normalize_cpf};
pub use advance::{
    generate_schedule, round2, Advance, Installment, InstallmentState, InvalidInput,
};
pub use entities::{
    Contract, ContractRegistry, Dependent, DependentRegistry, Dismissal,
    DismissalClassification, DismissalRegistry, Employee, EmployeeRegistry, EmployeeStatus,
    SalaryAdjustment, VacationRecord, VacationRegistry,
};
pub use users::{ActorContext, Role, User, UserRegistry};
pub use audit::{AuditEvent, AuditTrail};
pub use timeclock::{
    parse_afd_line, AfdLine, AfdPunch, ImportSummary, PunchKind, PunchRecord, TimeclockRegistry,
};
pub use exams::{ExamRecord, ExamRegistry, ExamType, HealthEntity};
pub use ppe::{CatalogItem, Distribution, ItemKind, PpeRegistry, ReturnRecord};
pub use validation::{QualityReport, RecordQualityEngine, Severity, ValidationResult};
pub use db::{
    get_active_contract, get_all_employees, get_all_punches, get_audit_events_for,
    get_employee, get_installments_of, get_pending_installments_due, insert_advance,
    insert_audit_event, insert_contract, insert_employee, insert_punches,
    mark_installment_deducted, setup_database, StoredInstallment,
};
pub use reports::{
    build_employee_summary, run_deductions, write_deduction_csv, write_punches_csv,
    DeductionLine, DeductionReport, EmployeeSummary,
};
pub use store::Store;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
