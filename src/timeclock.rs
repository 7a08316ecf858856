// ⏰ Time Clock - punch records and AFD file import
//
// AFD is the fixed-width punch-log format produced by clock terminals.
// Punch lines carry a record-type character at offset 9 ('3' = punch,
// '7' = adjusted punch), a DDMMYYYYHHMM timestamp at offsets 10..22 and a
// 12-wide identifier at offsets 22..34. Files arrive latin-1 encoded.
//
// The identifier on a punch can be a CPF, a PIS or a face-terminal id,
// depending on the terminal; matching runs the employee registry's
// fallback lookup. Unmatched punches are kept with the raw identifier so
// nothing from the clock is lost.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

use crate::entities::employee::EmployeeRegistry;

// ============================================================================
// PUNCH RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunchKind {
    /// Imported from an AFD terminal file
    AfdImport,

    /// Typed in by an operator
    Manual,
}

impl PunchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PunchKind::AfdImport => "AFD import",
            PunchKind::Manual => "Manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AFD import" => Some(PunchKind::AfdImport),
            "Manual" => Some(PunchKind::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunchRecord {
    pub id: i64,

    /// Set when the identifier matched an employee
    pub employee_cpf: Option<String>,
    pub pis: Option<String>,
    pub face_id: Option<String>,

    /// Raw identifier as it came from the terminal
    pub identifier: String,

    pub punched_at: NaiveDateTime,
    pub kind: PunchKind,
    pub note: Option<String>,

    // Provenance
    pub source_file: String,
    pub line_number: usize,
}

impl PunchRecord {
    /// Duplicate-detection key: one punch per identifier per minute.
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}", self.identifier, self.punched_at));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// AFD LINE PARSING
// ============================================================================

/// Minimum width of a punch line: 9-digit sequence number, type char,
/// 12-char timestamp, 12-char identifier.
const MIN_PUNCH_LINE_LEN: usize = 34;

const TYPE_OFFSET: usize = 9;
const TIMESTAMP_RANGE: std::ops::Range<usize> = 10..22;
const IDENTIFIER_RANGE: std::ops::Range<usize> = 22..34;

#[derive(Debug, Clone)]
pub struct AfdPunch {
    pub identifier: String,
    pub punched_at: NaiveDateTime,
    pub record_type: char,
    pub line_number: usize,
}

/// Outcome of parsing one AFD line.
#[derive(Debug)]
pub enum AfdLine {
    Punch(AfdPunch),

    /// Header, trailer or some record type we don't ingest
    NotAPunch,

    /// Looked like a punch but the timestamp did not parse
    Malformed,
}

/// Parse one AFD line. Byte offsets are positions in the original
/// latin-1 encoding, so this works on the raw bytes.
pub fn parse_afd_line(line: &[u8], line_number: usize) -> AfdLine {
    let line = trim_ascii(line);

    if line.len() < MIN_PUNCH_LINE_LEN {
        return AfdLine::NotAPunch;
    }

    let record_type = line[TYPE_OFFSET] as char;
    if record_type != '3' && record_type != '7' {
        return AfdLine::NotAPunch;
    }

    let timestamp = match std::str::from_utf8(&line[TIMESTAMP_RANGE]) {
        Ok(s) => s,
        Err(_) => return AfdLine::Malformed,
    };
    let punched_at = match NaiveDateTime::parse_from_str(timestamp, "%d%m%Y%H%M") {
        Ok(dt) => dt,
        Err(_) => return AfdLine::Malformed,
    };

    let identifier = String::from_utf8_lossy(&line[IDENTIFIER_RANGE])
        .trim()
        .to_string();
    if identifier.is_empty() {
        return AfdLine::Malformed;
    }

    AfdLine::Punch(AfdPunch {
        identifier,
        punched_at,
        record_type,
        line_number,
    })
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub not_a_punch: usize,
    pub malformed: usize,
}

// ============================================================================
// TIMECLOCK REGISTRY
// ============================================================================

pub struct TimeclockRegistry {
    punches: Vec<PunchRecord>,
    seen: HashSet<String>,
    next_id: i64,
}

impl TimeclockRegistry {
    pub fn new() -> Self {
        TimeclockRegistry {
            punches: Vec::new(),
            seen: HashSet::new(),
            next_id: 1,
        }
    }

    /// Record one punch. Returns None when an identical punch (same
    /// identifier, same minute) is already on file.
    pub fn record(&mut self, mut punch: PunchRecord) -> Option<i64> {
        let hash = punch.idempotency_hash();
        if !self.seen.insert(hash) {
            return None;
        }

        punch.id = self.next_id;
        self.next_id += 1;

        let id = punch.id;
        self.punches.push(punch);
        Some(id)
    }

    /// Operator-entered punch for one employee identifier.
    pub fn record_manual(
        &mut self,
        identifier: &str,
        punched_at: NaiveDateTime,
        note: Option<&str>,
        employees: &EmployeeRegistry,
    ) -> Option<i64> {
        let punch = build_punch(identifier, punched_at, PunchKind::Manual, employees);
        self.record(PunchRecord {
            note: note.map(|n| n.to_string()),
            ..punch
        })
    }

    /// Import an AFD file from disk.
    pub fn import_afd_file(
        &mut self,
        path: &Path,
        employees: &EmployeeRegistry,
    ) -> Result<ImportSummary> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read AFD file: {}", path.display()))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.afd")
            .to_string();

        Ok(self.import_afd_bytes(&bytes, &filename, employees))
    }

    /// Import AFD content already in memory. Never fails: bad lines are
    /// counted, not fatal.
    pub fn import_afd_bytes(
        &mut self,
        bytes: &[u8],
        source_file: &str,
        employees: &EmployeeRegistry,
    ) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for (idx, line) in bytes.split(|&b| b == b'\n').enumerate() {
            if trim_ascii(line).is_empty() {
                continue;
            }

            match parse_afd_line(line, idx + 1) {
                AfdLine::NotAPunch => summary.not_a_punch += 1,
                AfdLine::Malformed => summary.malformed += 1,
                AfdLine::Punch(afd) => {
                    let mut punch = build_punch(
                        &afd.identifier,
                        afd.punched_at,
                        PunchKind::AfdImport,
                        employees,
                    );
                    punch.source_file = source_file.to_string();
                    punch.line_number = afd.line_number;

                    if self.record(punch).is_some() {
                        summary.inserted += 1;
                    } else {
                        summary.duplicates += 1;
                    }
                }
            }
        }

        summary
    }

    pub fn all(&self) -> &[PunchRecord] {
        &self.punches
    }

    pub fn punches_of(&self, employee_cpf: &str) -> Vec<&PunchRecord> {
        self.punches
            .iter()
            .filter(|p| p.employee_cpf.as_deref() == Some(employee_cpf))
            .collect()
    }

    /// Punches whose identifier matched no employee - the review queue.
    pub fn unmatched(&self) -> Vec<&PunchRecord> {
        self.punches
            .iter()
            .filter(|p| p.employee_cpf.is_none())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.punches.len()
    }
}

impl Default for TimeclockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the identifier against the registry (CPF → PIS → face id) and
/// build the punch, matched or not.
fn build_punch(
    identifier: &str,
    punched_at: NaiveDateTime,
    kind: PunchKind,
    employees: &EmployeeRegistry,
) -> PunchRecord {
    let matched = employees.find_by_identifier(identifier);

    PunchRecord {
        id: 0,
        employee_cpf: matched.as_ref().map(|e| e.cpf.clone()),
        pis: matched.as_ref().and_then(|e| e.pis.clone()),
        face_id: matched.as_ref().and_then(|e| e.face_id.clone()),
        identifier: identifier.to_string(),
        punched_at,
        kind,
        note: None,
        source_file: String::new(),
        line_number: 0,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::employee::Employee;
    use chrono::NaiveDate;

    fn employees() -> EmployeeRegistry {
        let mut registry = EmployeeRegistry::new();
        let mut e = Employee::new(
            "11144477735",
            "Maria Souza",
            NaiveDate::from_ymd_opt(1990, 5, 20).unwrap(),
        );
        e.pis = Some("120564125474".to_string());
        e.pix_key = Some("maria@example.com".to_string());
        registry.register(e).unwrap();
        registry
    }

    /// Build a punch line: 9-digit NSR + type + DDMMYYYYHHMM + 12-wide id.
    fn punch_line(nsr: u32, record_type: char, timestamp: &str, identifier: &str) -> String {
        format!("{:09}{}{}{:<12}", nsr, record_type, timestamp, identifier)
    }

    #[test]
    fn test_parse_valid_punch_line() {
        let line = punch_line(1, '3', "150120240830", "11144477735");
        match parse_afd_line(line.as_bytes(), 1) {
            AfdLine::Punch(punch) => {
                assert_eq!(punch.identifier, "11144477735");
                assert_eq!(punch.record_type, '3');
                assert_eq!(
                    punch.punched_at,
                    NaiveDate::from_ymd_opt(2024, 1, 15)
                        .unwrap()
                        .and_hms_opt(8, 30, 0)
                        .unwrap()
                );
            }
            other => panic!("expected punch, got {:?}", other),
        }
    }

    #[test]
    fn test_short_line_is_not_a_punch() {
        assert!(matches!(parse_afd_line(b"000000001", 1), AfdLine::NotAPunch));
    }

    #[test]
    fn test_header_record_type_skipped() {
        // Type '1' is a header record, not a punch
        let line = punch_line(1, '1', "150120240830", "11144477735");
        assert!(matches!(
            parse_afd_line(line.as_bytes(), 1),
            AfdLine::NotAPunch
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        // Month 13 does not exist
        let line = punch_line(1, '3', "151320240830", "11144477735");
        assert!(matches!(
            parse_afd_line(line.as_bytes(), 1),
            AfdLine::Malformed
        ));
    }

    #[test]
    fn test_adjusted_punch_type_7_accepted() {
        let line = punch_line(2, '7', "150120241715", "11144477735");
        assert!(matches!(parse_afd_line(line.as_bytes(), 1), AfdLine::Punch(_)));
    }

    #[test]
    fn test_import_matches_by_cpf() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let content = punch_line(1, '3', "150120240830", "11144477735");
        let summary = registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);

        assert_eq!(summary.inserted, 1);
        let punch = &registry.all()[0];
        assert_eq!(punch.employee_cpf.as_deref(), Some("11144477735"));
        assert_eq!(punch.pis.as_deref(), Some("120564125474"));
        assert_eq!(punch.kind, PunchKind::AfdImport);
        assert_eq!(punch.source_file, "clock.afd");
    }

    #[test]
    fn test_import_matches_by_pis_fallback() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let content = punch_line(1, '3', "150120240830", "120564125474");
        registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);

        let punch = &registry.all()[0];
        assert_eq!(punch.employee_cpf.as_deref(), Some("11144477735"));
        assert_eq!(punch.identifier, "120564125474");
    }

    #[test]
    fn test_unmatched_punch_is_kept() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let content = punch_line(1, '3', "150120240830", "999999999999");
        let summary = registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);

        assert_eq!(summary.inserted, 1);
        assert_eq!(registry.unmatched().len(), 1);
        assert_eq!(registry.unmatched()[0].identifier, "999999999999");
    }

    #[test]
    fn test_import_skips_duplicates_and_counts() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let mut content = String::new();
        content.push_str(&punch_line(1, '3', "150120240830", "11144477735"));
        content.push('\n');
        // Same identifier and minute - duplicate
        content.push_str(&punch_line(2, '3', "150120240830", "11144477735"));
        content.push('\n');
        // Header record
        content.push_str(&punch_line(3, '1', "150120240830", "11144477735"));
        content.push('\n');
        // Bad timestamp
        content.push_str(&punch_line(4, '3', "999920240830", "11144477735"));
        content.push('\n');

        let summary = registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.not_a_punch, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let content = punch_line(1, '3', "150120240830", "11144477735");

        let first = registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);
        let second = registry.import_afd_bytes(content.as_bytes(), "clock.afd", &employees);

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_manual_punch() {
        let employees = employees();
        let mut registry = TimeclockRegistry::new();

        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 1, 0)
            .unwrap();

        let id = registry
            .record_manual("111.444.777-35", at, Some("forgot badge"), &employees)
            .unwrap();

        let punch = registry.all().iter().find(|p| p.id == id).unwrap();
        assert_eq!(punch.kind, PunchKind::Manual);
        assert_eq!(punch.employee_cpf.as_deref(), Some("11144477735"));
        assert_eq!(punch.note.as_deref(), Some("forgot badge"));
    }

    #[test]
    fn test_latin1_bytes_do_not_break_parsing() {
        // A latin-1 'ç' (0xE7) in the identifier region is carried through
        // lossily without panicking
        let mut line = punch_line(1, '3', "150120240830", "X").into_bytes();
        line[25] = 0xE7;
        assert!(matches!(parse_afd_line(&line, 1), AfdLine::Punch(_)));
    }
}
