// Entity Models - employees and everything hanging off them
//
// Each entity has:
// - A stable key (CPF for people, sequential id for records)
// - Validation applied at registration time
// - A registry for lookups and the invariants that span records

pub mod contract;
pub mod dependent;
pub mod dismissal;
pub mod employee;
pub mod reference;
pub mod vacation;

pub use contract::{Contract, ContractRegistry, SalaryAdjustment};
pub use dependent::{Dependent, DependentRegistry};
pub use dismissal::{Dismissal, DismissalClassification, DismissalRegistry, MIN_REASON_LEN};
pub use employee::{Employee, EmployeeRegistry, EmployeeStatus};
pub use reference::{
    City, CityRegistry, NamedItem, NamedItemRegistry, ShiftSchedule, ShiftScheduleRegistry,
};
pub use vacation::{VacationRecord, VacationRegistry};
