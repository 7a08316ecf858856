// 🩺 Occupational Health Exams - types, requirements per role, records
//
// Exam types carry a periodicity in days; an exam recorded without an
// explicit expiry gets performed_date + periodicity. Roles map to the
// exam types they require, which drives the "who is missing what" and
// "what expires soon" queries the compliance officer runs.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cpf::normalize_cpf;

// ============================================================================
// EXAM TYPE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamType {
    pub id: i64,
    pub name: String,
    pub periodicity_days: u32,
    pub notes: Option<String>,
}

// ============================================================================
// HEALTH ENTITY
// ============================================================================

/// Physician or clinic responsible for exams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEntity {
    pub id: i64,
    pub name: String,

    /// CRM for physicians, CNPJ for clinics
    pub registration: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

// ============================================================================
// EMPLOYEE EXAM RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: i64,
    pub employee_cpf: String,
    pub exam_type_id: i64,
    pub performed_date: NaiveDate,
    pub due_date: NaiveDate,
    pub entity_id: Option<i64>,
    pub notes: Option<String>,
}

impl ExamRecord {
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.due_date < as_of
    }
}

// ============================================================================
// EXAM REGISTRY
// ============================================================================

pub struct ExamRegistry {
    types: Vec<ExamType>,
    entities: Vec<HealthEntity>,
    /// (role name, exam type id) requirement pairs
    requirements: Vec<(String, i64)>,
    records: Vec<ExamRecord>,
    next_type_id: i64,
    next_entity_id: i64,
    next_record_id: i64,
}

impl ExamRegistry {
    pub fn new() -> Self {
        ExamRegistry {
            types: Vec::new(),
            entities: Vec::new(),
            requirements: Vec::new(),
            records: Vec::new(),
            next_type_id: 1,
            next_entity_id: 1,
            next_record_id: 1,
        }
    }

    // ------------------------------------------------------------------------
    // Types and entities
    // ------------------------------------------------------------------------

    pub fn add_type(&mut self, name: &str, periodicity_days: u32) -> Result<i64, String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("exam type name cannot be empty".to_string());
        }
        if periodicity_days == 0 {
            return Err("exam periodicity must be at least 1 day".to_string());
        }
        if self
            .types
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(trimmed))
        {
            return Err(format!("exam type already exists: {}", trimmed));
        }

        let id = self.next_type_id;
        self.next_type_id += 1;
        self.types.push(ExamType {
            id,
            name: trimmed.to_string(),
            periodicity_days,
            notes: None,
        });
        Ok(id)
    }

    pub fn find_type(&self, id: i64) -> Option<&ExamType> {
        self.types.iter().find(|t| t.id == id)
    }

    pub fn add_entity(&mut self, entity: HealthEntity) -> i64 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.push(HealthEntity { id, ..entity });
        id
    }

    pub fn find_entity(&self, id: i64) -> Option<&HealthEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    // ------------------------------------------------------------------------
    // Role requirements
    // ------------------------------------------------------------------------

    /// Declare that a job role requires an exam type.
    pub fn require_for_role(&mut self, role: &str, exam_type_id: i64) -> Result<(), String> {
        if self.find_type(exam_type_id).is_none() {
            return Err(format!("unknown exam type: {}", exam_type_id));
        }

        let role = role.trim().to_string();
        if !self
            .requirements
            .iter()
            .any(|(r, t)| r.eq_ignore_ascii_case(&role) && *t == exam_type_id)
        {
            self.requirements.push((role, exam_type_id));
        }
        Ok(())
    }

    pub fn required_for_role(&self, role: &str) -> Vec<&ExamType> {
        self.requirements
            .iter()
            .filter(|(r, _)| r.eq_ignore_ascii_case(role.trim()))
            .filter_map(|(_, t)| self.find_type(*t))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Exam records
    // ------------------------------------------------------------------------

    /// Record an exam. When due_date is None it is derived from the exam
    /// type's periodicity.
    pub fn record_exam(
        &mut self,
        employee_cpf: &str,
        exam_type_id: i64,
        performed_date: NaiveDate,
        due_date: Option<NaiveDate>,
        entity_id: Option<i64>,
    ) -> Result<i64, String> {
        let exam_type = self
            .find_type(exam_type_id)
            .ok_or_else(|| format!("unknown exam type: {}", exam_type_id))?;

        if let Some(entity_id) = entity_id {
            if self.find_entity(entity_id).is_none() {
                return Err(format!("unknown health entity: {}", entity_id));
            }
        }

        let due_date = due_date
            .unwrap_or(performed_date + Duration::days(exam_type.periodicity_days as i64));
        if due_date < performed_date {
            return Err("exam due date cannot precede the performed date".to_string());
        }

        let id = self.next_record_id;
        self.next_record_id += 1;
        self.records.push(ExamRecord {
            id,
            employee_cpf: normalize_cpf(employee_cpf),
            exam_type_id,
            performed_date,
            due_date,
            entity_id,
            notes: None,
        });
        Ok(id)
    }

    pub fn exams_of(&self, employee_cpf: &str) -> Vec<&ExamRecord> {
        let clean = normalize_cpf(employee_cpf);
        self.records
            .iter()
            .filter(|r| r.employee_cpf == clean)
            .collect()
    }

    /// Exams whose due date falls within the next `days` days (inclusive),
    /// overdue ones included.
    pub fn due_within(&self, as_of: NaiveDate, days: u32) -> Vec<&ExamRecord> {
        let horizon = as_of + Duration::days(days as i64);
        let mut due: Vec<&ExamRecord> = self
            .records
            .iter()
            .filter(|r| r.due_date <= horizon)
            .collect();
        due.sort_by_key(|r| r.due_date);
        due
    }

    pub fn overdue(&self, as_of: NaiveDate) -> Vec<&ExamRecord> {
        self.records.iter().filter(|r| r.is_overdue(as_of)).collect()
    }

    /// Exam types required for the role with no currently-valid record for
    /// the employee.
    pub fn missing_for(&self, employee_cpf: &str, role: &str, as_of: NaiveDate) -> Vec<&ExamType> {
        let clean = normalize_cpf(employee_cpf);

        self.required_for_role(role)
            .into_iter()
            .filter(|exam_type| {
                !self.records.iter().any(|r| {
                    r.employee_cpf == clean
                        && r.exam_type_id == exam_type.id
                        && !r.is_overdue(as_of)
                })
            })
            .collect()
    }
}

impl Default for ExamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
