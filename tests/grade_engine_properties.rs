#[path = "../src/attendance.rs"]
mod attendance;
#[path = "../src/calc.rs"]
mod calc;
#[path = "../src/notify.rs"]
mod notify;
#[path = "../src/progress.rs"]
mod progress;

use attendance::{AttendanceRecord, Scope, Status};
use calc::{Component, GradeInput};
use progress::Trigger;

fn uniform(value: &str) -> GradeInput {
    let mut input = GradeInput::default();
    for c in Component::ALL {
        for i in 0..c.slots() {
            assert!(input.set(c, i, value));
        }
    }
    input
}

fn marks(entries: &[(&str, Status)]) -> AttendanceRecord {
    entries.iter().map(|(d, s)| (d.to_string(), *s)).collect()
}

#[test]
fn empty_slots_contribute_nothing() {
    let empty: [&str; 10] = [""; 10];
    let r = calc::calc(&empty, 0.30, 1000.0);
    assert_eq!((r.total, r.ps, r.ws), (0.0, 0.0, 0.0));

    let report = calc::grade_report(&GradeInput::default());
    assert_eq!(report.raw_final_grade, 0.0);
    assert_eq!(report.final_grade, 60);
    assert!(!report.passed());
}

#[test]
fn transmute_is_clamped_and_monotonic() {
    let mut prev = calc::transmute(-50.0);
    let mut x = -50.0;
    while x <= 150.0 {
        let t = calc::transmute(x);
        assert!(t >= prev, "transmute({}) = {} < {}", x, t, prev);
        if x <= 60.0 {
            assert_eq!(t, 60);
        }
        if x >= 100.0 {
            assert_eq!(t, 100);
        }
        prev = t;
        x += 0.25;
    }
    assert_eq!(calc::transmute(75.4), 75);
    assert_eq!(calc::transmute(74.5), 75);
    assert_eq!(calc::transmute(f64::NAN), 60);
}

#[test]
fn raw_final_grade_is_sum_of_weighted_scores() {
    let mut input = GradeInput::default();
    input.set(Component::WrittenWork, 0, "88");
    input.set(Component::WrittenWork, 4, "72.5");
    input.set(Component::PerformanceTask, 2, "95");
    input.set(Component::PerformanceTask, 9, "abc");
    input.set(Component::QuarterlyAssessment, 0, "81");
    let report = calc::grade_report(&input);
    assert_eq!(
        report.raw_final_grade,
        report.ww.ws + report.pt.ws + report.qa.ws
    );
    assert_eq!(report.ww.total, 160.5);
    assert_eq!(report.pt.total, 95.0);
}

#[test]
fn perfect_scores_reach_one_hundred() {
    let report = calc::grade_report(&uniform("100"));
    for c in [report.ww, report.pt, report.qa] {
        assert!((c.ps - 100.0).abs() < 1e-9);
    }
    assert!((report.ww.ws - 30.0).abs() < 1e-9);
    assert!((report.pt.ws - 50.0).abs() < 1e-9);
    assert!((report.qa.ws - 20.0).abs() < 1e-9);
    assert!((report.raw_final_grade - 100.0).abs() < 1e-9);
    assert_eq!(report.final_grade, 100);
}

#[test]
fn calculation_is_pure() {
    let input = uniform("83");
    assert_eq!(calc::grade_report(&input), calc::grade_report(&input));
}

#[test]
fn over_max_scores_are_not_clamped() {
    let mut input = GradeInput::default();
    input.set(Component::QuarterlyAssessment, 0, "150");
    let report = calc::grade_report(&input);
    assert_eq!(report.qa.ps, 150.0);
    assert_eq!(report.qa.ws, 30.0);
}

#[test]
fn attendance_percent_examples() {
    let s = attendance::aggregate(
        &marks(&[("2024-01-01", Status::Present), ("2024-01-02", Status::Absent)]),
        Scope::AllTime,
    );
    assert_eq!((s.present, s.absent, s.percent), (1, 1, 50));

    let late_only = attendance::aggregate(&marks(&[("2024-01-03", Status::Late)]), Scope::AllTime);
    assert_eq!(late_only.percent, 0);
    assert_eq!(late_only.total, 1);
}

#[test]
fn absence_threshold_is_three() {
    let three = marks(&[
        ("2024-02-05", Status::Absent),
        ("2024-02-06", Status::Absent),
        ("2024-02-07", Status::Absent),
    ]);
    let r = progress::evaluate("Rizal", "Ana Reyes", &three, &uniform("90"));
    assert_eq!(r.triggers, vec![Trigger::ExcessiveAbsences(3)]);
    assert_eq!(
        notify::messages(&r),
        vec!["Rizal, Ana Reyes has 3 absences.".to_string()]
    );

    let two = marks(&[("2024-02-05", Status::Absent), ("2024-02-06", Status::Absent)]);
    let r = progress::evaluate("Rizal", "Ana Reyes", &two, &uniform("90"));
    assert!(r.triggers.is_empty());
    assert!(r.passed);
}

#[test]
fn evaluation_does_not_dispatch() {
    let r = progress::evaluate("Rizal", "Ana Reyes", &AttendanceRecord::new(), &GradeInput::default());
    assert_eq!(r.triggers, vec![Trigger::Failing(60)]);
    assert_eq!(r.final_grade(), 60);

    let mut sink: Vec<String> = Vec::new();
    let sent = notify::dispatch(&mut sink, &r).expect("dispatch");
    assert_eq!(sent.len(), 1);
    assert_eq!(sink[0], "Rizal, Ana Reyes is failing (Final Grade: 60).");
}
