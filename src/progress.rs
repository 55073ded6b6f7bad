use crate::attendance::{self, AttendanceRecord, AttendanceSummary, Scope};
use crate::calc::{self, GradeInput, GradeReport};
use serde::Serialize;

/// Counts at or above this raise an at-risk trigger.
pub const ABSENCE_THRESHOLD: u32 = 3;
pub const LATE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Trigger {
    ExcessiveAbsences(u32),
    ExcessiveLates(u32),
    Failing(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResult {
    pub section_name: String,
    pub student_name: String,
    pub attendance: AttendanceSummary,
    pub grades: GradeReport,
    pub passed: bool,
    pub triggers: Vec<Trigger>,
}

impl ProgressResult {
    pub fn final_grade(&self) -> i64 {
        self.grades.final_grade
    }
}

pub fn evaluate(
    section_name: &str,
    student_name: &str,
    record: &AttendanceRecord,
    input: &GradeInput,
) -> ProgressResult {
    let attendance = attendance::aggregate(record, Scope::AllTime);
    let grades = calc::grade_report(input);
    let passed = grades.passed();

    let mut triggers = Vec::new();
    if attendance.absent >= ABSENCE_THRESHOLD {
        triggers.push(Trigger::ExcessiveAbsences(attendance.absent));
    }
    if attendance.late >= LATE_THRESHOLD {
        triggers.push(Trigger::ExcessiveLates(attendance.late));
    }
    if !passed {
        triggers.push(Trigger::Failing(grades.final_grade));
    }

    ProgressResult {
        section_name: section_name.to_string(),
        student_name: student_name.to_string(),
        attendance,
        grades,
        passed,
        triggers,
    }
}
