use crate::progress::{ProgressResult, Trigger};
use serde::Serialize;

/// Newest entries kept per user.
pub const HISTORY_LIMIT: usize = 50;

pub const GRADES_CLEARED: &str = "All grades cleared.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    pub timestamp: String,
}

pub trait NotificationSink {
    fn push(&mut self, message: &str) -> anyhow::Result<()>;
}

impl NotificationSink for Vec<String> {
    fn push(&mut self, message: &str) -> anyhow::Result<()> {
        Vec::push(self, message.to_string());
        Ok(())
    }
}

pub fn render(section_name: &str, student_name: &str, trigger: &Trigger) -> String {
    match trigger {
        Trigger::ExcessiveAbsences(n) => {
            format!("{}, {} has {} absences.", section_name, student_name, n)
        }
        Trigger::ExcessiveLates(n) => format!("{}, {} has {} lates.", section_name, student_name, n),
        Trigger::Failing(grade) => format!(
            "{}, {} is failing (Final Grade: {}).",
            section_name, student_name, grade
        ),
    }
}

pub fn messages(result: &ProgressResult) -> Vec<String> {
    result
        .triggers
        .iter()
        .map(|t| render(&result.section_name, &result.student_name, t))
        .collect()
}

/// Push one message per trigger. Returns what was sent, in trigger order.
pub fn dispatch<S: NotificationSink + ?Sized>(
    sink: &mut S,
    result: &ProgressResult,
) -> anyhow::Result<Vec<String>> {
    let out = messages(result);
    for m in &out {
        sink.push(m)?;
        tracing::info!(text = %m, "notification dispatched");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{AttendanceRecord, Status};
    use crate::calc::GradeInput;
    use crate::progress;

    #[test]
    fn failing_student_gets_all_messages() {
        let mut record = AttendanceRecord::new();
        for d in 1..=3 {
            record.insert(format!("2024-05-0{}", d), Status::Absent);
            record.insert(format!("2024-06-0{}", d), Status::Late);
        }
        let result = progress::evaluate("Grade 7 - Rizal", "Juan Cruz", &record, &GradeInput::default());
        let mut sink: Vec<String> = Vec::new();
        let sent = dispatch(&mut sink, &result).expect("dispatch");
        assert_eq!(sent, sink);
        assert_eq!(
            sink,
            vec![
                "Grade 7 - Rizal, Juan Cruz has 3 absences.".to_string(),
                "Grade 7 - Rizal, Juan Cruz has 3 lates.".to_string(),
                "Grade 7 - Rizal, Juan Cruz is failing (Final Grade: 60).".to_string(),
            ]
        );
    }
}
