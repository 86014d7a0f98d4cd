use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One student's status for one class on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: String,
    pub present: bool,
    /// Excused absence. Only meaningful when `present` is false.
    #[serde(default)]
    pub justified: bool,
}

/// The unit of submission: every expected student's mark for one
/// class on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceBatch {
    pub class_id: String,
    pub date: String,
    pub marks: Vec<AttendanceMark>,
}

impl AttendanceBatch {
    /// Rejects batches that could never be committed remotely: empty
    /// mark lists, duplicate students, malformed dates, and marks
    /// claiming a justified presence.
    pub fn validate(&self) -> Result<(), String> {
        if self.class_id.trim().is_empty() {
            return Err("classId must not be empty".to_string());
        }
        parse_date(&self.date)?;
        if self.marks.is_empty() {
            return Err("batch has no marks".to_string());
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for mark in &self.marks {
            if mark.student_id.trim().is_empty() {
                return Err("mark has empty studentId".to_string());
            }
            if !seen.insert(mark.student_id.as_str()) {
                return Err(format!("duplicate mark for student {}", mark.student_id));
            }
            if mark.justified && mark.present {
                return Err(format!(
                    "student {} marked justified while present",
                    mark.student_id
                ));
            }
        }
        Ok(())
    }
}

/// In-progress roll call for the screen currently open. `None` means the
/// student has not been marked yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDraft {
    pub class_id: String,
    pub date: String,
    pub marks: BTreeMap<String, Option<bool>>,
}

impl SessionDraft {
    pub fn matches(&self, class_id: &str, date: &str) -> bool {
        self.class_id == class_id && self.date == date
    }
}

/// A queued batch awaiting remote delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEntry {
    pub id: String,
    pub batch: AttendanceBatch,
    pub enqueued_at: String,
    pub attempts: i64,
}

pub fn parse_date(date: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| format!("date must be YYYY-MM-DD, got {:?}", date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(student_id: &str, present: bool, justified: bool) -> AttendanceMark {
        AttendanceMark {
            student_id: student_id.to_string(),
            present,
            justified,
        }
    }

    fn batch(marks: Vec<AttendanceMark>) -> AttendanceBatch {
        AttendanceBatch {
            class_id: "c1".to_string(),
            date: "2024-05-10".to_string(),
            marks,
        }
    }

    #[test]
    fn valid_batch_passes() {
        let b = batch(vec![mark("s1", true, false), mark("s2", false, true)]);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn justified_requires_absent() {
        let b = batch(vec![mark("s1", true, true)]);
        assert!(b.validate().is_err());
    }

    #[test]
    fn empty_and_duplicate_marks_rejected() {
        assert!(batch(vec![]).validate().is_err());
        let dup = batch(vec![mark("s1", true, false), mark("s1", false, false)]);
        assert!(dup.validate().is_err());
    }

    #[test]
    fn bad_date_rejected() {
        let mut b = batch(vec![mark("s1", true, false)]);
        b.date = "10/05/2024".to_string();
        assert!(b.validate().is_err());
    }
}
