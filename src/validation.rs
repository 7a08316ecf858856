// ✅ Record Quality - batch checks over employee records
//
// Validates what the entry forms cannot fully guarantee, e.g. records
// migrated from spreadsheets. Each rule yields a pass/fail result with a
// severity; critical failures make a record unfit for payroll.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cpf::is_valid_cpf;
use crate::entities::employee::Employee;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Record cannot go through payroll
    Critical,

    /// Questionable, flagged for review
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub rule_name: String,
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationResult {
    pub fn pass(rule_name: &str, field: &str) -> Self {
        ValidationResult {
            passed: true,
            rule_name: rule_name.to_string(),
            field: field.to_string(),
            message: String::new(),
            severity: Severity::Warning,
        }
    }

    pub fn fail(rule_name: &str, field: &str, message: &str, severity: Severity) -> Self {
        ValidationResult {
            passed: false,
            rule_name: rule_name.to_string(),
            field: field.to_string(),
            message: message.to_string(),
            severity,
        }
    }
}

// ============================================================================
// QUALITY REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub cpf: String,
    pub validations: Vec<ValidationResult>,
    pub passed_count: usize,
    pub failed_count: usize,
}

impl QualityReport {
    pub fn has_critical_issues(&self) -> bool {
        self.validations
            .iter()
            .any(|v| !v.passed && v.severity == Severity::Critical)
    }

    pub fn failures(&self) -> Vec<&ValidationResult> {
        self.validations.iter().filter(|v| !v.passed).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} passed, {} failed{}",
            self.cpf,
            self.passed_count,
            self.failed_count,
            if self.has_critical_issues() {
                " (CRITICAL)"
            } else {
                ""
            }
        )
    }
}

// ============================================================================
// QUALITY ENGINE
// ============================================================================

pub struct RecordQualityEngine {
    /// Employees younger than this at admission are flagged
    minimum_age_years: i32,
}

impl RecordQualityEngine {
    pub fn new() -> Self {
        RecordQualityEngine {
            minimum_age_years: 14,
        }
    }

    /// Run every rule over one employee record.
    pub fn validate(&self, employee: &Employee, today: NaiveDate) -> QualityReport {
        let mut validations = Vec::new();

        // Rule 1: CPF arithmetic
        validations.push(if is_valid_cpf(&employee.cpf) {
            ValidationResult::pass("cpf_check_digits", "cpf")
        } else {
            ValidationResult::fail(
                "cpf_check_digits",
                "cpf",
                "CPF fails check-digit validation",
                Severity::Critical,
            )
        });

        // Rule 2: name present
        validations.push(if employee.name.trim().is_empty() {
            ValidationResult::fail("name_present", "name", "name is empty", Severity::Critical)
        } else {
            ValidationResult::pass("name_present", "name")
        });

        // Rule 3: payment route
        validations.push(if employee.has_payment_route() {
            ValidationResult::pass("payment_route", "pix_key")
        } else {
            ValidationResult::fail(
                "payment_route",
                "pix_key",
                "no PIX key and incomplete bank details",
                Severity::Critical,
            )
        });

        // Rule 4: birth date sanity
        validations.push(self.validate_birth_date(employee.birth_date, today));

        // Rule 5: postal code shape (8 digits)
        validations.push(match employee.postal_code.as_deref() {
            None => ValidationResult::pass("postal_code_shape", "postal_code"),
            Some(cep) => {
                let digits: String = cep.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() == 8 {
                    ValidationResult::pass("postal_code_shape", "postal_code")
                } else {
                    ValidationResult::fail(
                        "postal_code_shape",
                        "postal_code",
                        "postal code does not have 8 digits",
                        Severity::Warning,
                    )
                }
            }
        });

        // Rule 6: PIS shape (11 or 12 digits as terminals emit)
        validations.push(match employee.pis.as_deref() {
            None => ValidationResult::pass("pis_shape", "pis"),
            Some(pis) => {
                let digits: String = pis.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.len() == 11 || digits.len() == 12 {
                    ValidationResult::pass("pis_shape", "pis")
                } else {
                    ValidationResult::fail(
                        "pis_shape",
                        "pis",
                        "PIS does not have 11-12 digits",
                        Severity::Warning,
                    )
                }
            }
        });

        let passed_count = validations.iter().filter(|v| v.passed).count();
        let failed_count = validations.len() - passed_count;

        QualityReport {
            cpf: employee.cpf.clone(),
            validations,
            passed_count,
            failed_count,
        }
    }

    /// Validate a batch; returns the reports of records with failures.
    pub fn validate_batch(&self, employees: &[Employee], today: NaiveDate) -> Vec<QualityReport> {
        employees
            .iter()
            .map(|e| self.validate(e, today))
            .filter(|r| r.failed_count > 0)
            .collect()
    }

    fn validate_birth_date(&self, birth_date: NaiveDate, today: NaiveDate) -> ValidationResult {
        if birth_date >= today {
            return ValidationResult::fail(
                "birth_date_sanity",
                "birth_date",
                "birth date is not in the past",
                Severity::Critical,
            );
        }

        let age = today.year() - birth_date.year();
        if age < self.minimum_age_years {
            return ValidationResult::fail(
                "birth_date_sanity",
                "birth_date",
                "employee is below the minimum working age",
                Severity::Warning,
            );
        }
        if age > 100 {
            return ValidationResult::fail(
                "birth_date_sanity",
                "birth_date",
                "age above 100, likely a typo",
                Severity::Warning,
            );
        }

        ValidationResult::pass("birth_date_sanity", "birth_date")
    }
}

impl Default for RecordQualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn good_employee() -> Employee {
        let mut e = Employee::new(
            "11144477735",
            "Maria Souza",
            NaiveDate::from_ymd_opt(1990, 5, 20).unwrap(),
        );
        e.pix_key = Some("maria@example.com".to_string());
        e.postal_code = Some("01310-100".to_string());
        e.pis = Some("12056412547".to_string());
        e
    }

    #[test]
    fn test_clean_record_passes_everything() {
        let report = RecordQualityEngine::new().validate(&good_employee(), today());

        assert_eq!(report.failed_count, 0);
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_bad_cpf_is_critical() {
        let mut e = good_employee();
        e.cpf = "12345678900".to_string();

        let report = RecordQualityEngine::new().validate(&e, today());
        assert!(report.has_critical_issues());
        assert!(report
            .failures()
            .iter()
            .any(|f| f.rule_name == "cpf_check_digits"));
    }

    #[test]
    fn test_missing_payment_route_is_critical() {
        let mut e = good_employee();
        e.pix_key = None;

        let report = RecordQualityEngine::new().validate(&e, today());
        assert!(report.has_critical_issues());
    }

    #[test]
    fn test_bad_postal_code_is_warning_only() {
        let mut e = good_employee();
        e.postal_code = Some("123".to_string());

        let report = RecordQualityEngine::new().validate(&e, today());
        assert_eq!(report.failed_count, 1);
        assert!(!report.has_critical_issues());
    }

    #[test]
    fn test_future_birth_date_is_critical() {
        let mut e = good_employee();
        e.birth_date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

        let report = RecordQualityEngine::new().validate(&e, today());
        assert!(report.has_critical_issues());
    }

    #[test]
    fn test_batch_returns_only_offenders() {
        let engine = RecordQualityEngine::new();
        let good = good_employee();
        let mut bad = good_employee();
        bad.postal_code = Some("x".to_string());

        let reports = engine.validate_batch(&[good, bad], today());
        assert_eq!(reports.len(), 1);
    }
}
