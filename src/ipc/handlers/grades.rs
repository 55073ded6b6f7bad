use crate::calc::{self, Component, GradeInput};
use crate::ipc::handlers::setup;
use crate::ipc::handlers::students::{require_section, resolve_sort};
use crate::ipc::helpers::{db_err, get_required_str, with_store, HandlerErr, StoreHandler};
use crate::ipc::types::{AppState, Request};
use crate::notify::{NotificationSink, GRADES_CLEARED};
use crate::store::StoreCtx;
use serde_json::{json, Value};

/// Edits need an active student; reads also reach removed ones.
fn require_student(
    ctx: &StoreCtx<'_>,
    section_id: &str,
    student_id: &str,
    include_removed: bool,
) -> Result<(), HandlerErr> {
    require_section(ctx, section_id)?;
    let found = if include_removed {
        ctx.student_known_in_section(section_id, student_id)
    } else {
        ctx.student_get(section_id, student_id).map(|s| s.is_some())
    }
    .map_err(db_err("db_query_failed"))?;
    if !found {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(())
}

fn load_input(
    ctx: &StoreCtx<'_>,
    section_id: &str,
    student_id: &str,
) -> Result<GradeInput, HandlerErr> {
    ctx.grade_input_get(section_id, student_id)
        .map_err(db_err("db_query_failed"))
}

/// Score cells accept typed text as-is; numbers are stored in their JSON
/// spelling and null clears the slot.
fn score_text(params: &Value) -> Result<String, HandlerErr> {
    match params.get("value") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(HandlerErr::bad_params("value must be string, number or null")),
    }
}

fn grades_get(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let student_id = get_required_str(params, "studentId")?;
    require_student(ctx, &section_id, &student_id, true)?;
    let input = load_input(ctx, &section_id, &student_id)?;
    let report = calc::grade_report(&input);
    Ok(json!({ "input": input, "filledSlots": input.filled_slots(), "report": report }))
}

fn grades_set_score(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let component = Component::parse(&get_required_str(params, "component")?)
        .ok_or_else(|| HandlerErr::bad_params("component must be WW, PT or QA"))?;
    let index = params
        .get("index")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing index"))? as usize;
    if index >= component.slots() {
        return Err(HandlerErr::bad_params(format!(
            "index must be < {} for {}",
            component.slots(),
            component.code()
        ))
        .with_details(json!({ "component": component.code(), "index": index })));
    }
    let raw = score_text(params)?;
    require_student(ctx, &section_id, &student_id, false)?;

    ctx.grade_slot_set(&section_id, &student_id, component, index, &raw)
        .map_err(db_err("db_update_failed"))?;
    let input = load_input(ctx, &section_id, &student_id)?;
    let report = calc::grade_report(&input);
    Ok(json!({ "input": input, "report": report }))
}

fn grades_clear_all(ctx: &StoreCtx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let cleared = ctx
        .grades_clear_all()
        .map_err(|e| db_err("db_tx_failed")(e).with_details(json!({ "table": "grade_slots" })))?;
    tracing::info!(slots = cleared, "grades cleared");

    if setup::notifications_enabled(ctx).map_err(db_err("db_query_failed"))? {
        let mut sink = *ctx;
        sink.push(GRADES_CLEARED)
            .map_err(db_err("db_insert_failed"))?;
    }
    Ok(json!({ "ok": true, "slotsCleared": cleared }))
}

fn grades_section_report(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    require_section(ctx, &section_id)?;
    let sort = resolve_sort(ctx, params)?;
    let students = ctx
        .students_list(&section_id, sort)
        .map_err(db_err("db_query_failed"))?;

    let mut rows = Vec::with_capacity(students.len());
    for s in students {
        let input = load_input(ctx, &section_id, &s.id)?;
        let report = calc::grade_report(&input);
        rows.push(json!({
            "studentId": s.id,
            "name": s.name,
            "lrn": s.lrn,
            "gender": s.gender,
            "passed": report.passed(),
            "report": report
        }));
    }
    Ok(json!({ "sectionId": section_id, "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "grades.get" => grades_get,
        "grades.setScore" => grades_set_score,
        "grades.clearAll" => grades_clear_all,
        "grades.sectionReport" => grades_section_report,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
