use crate::attendance::{self, AttendanceRecord, Scope, Status};
use crate::ipc::helpers::{
    db_err, get_optional_str, get_required_str, with_store, HandlerErr, StoreHandler,
};
use crate::ipc::types::{AppState, Request};
use crate::store::StoreCtx;
use serde_json::{json, Value};

fn require_student(ctx: &StoreCtx<'_>, student_id: &str) -> Result<(), HandlerErr> {
    let known = ctx
        .student_known(student_id)
        .map_err(db_err("db_query_failed"))?;
    if !known {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(())
}

fn parse_date(params: &Value) -> Result<String, HandlerErr> {
    let date = get_required_str(params, "date")?;
    let date = date.trim();
    if !attendance::is_iso_date(date) {
        return Err(HandlerErr::bad_params("date must be YYYY-MM-DD"));
    }
    Ok(date.to_string())
}

fn parse_scope(params: &Value) -> Result<Scope, HandlerErr> {
    match get_optional_str(params, "month")? {
        None => Ok(Scope::AllTime),
        Some(m) => Scope::parse_month(&m)
            .ok_or_else(|| HandlerErr::bad_params("month must be YYYY-MM")),
    }
}

fn status_json(status: Option<Status>) -> Value {
    status.map(|s| json!(s.as_str())).unwrap_or(Value::Null)
}

fn record_json(record: &AttendanceRecord, scope: Scope) -> Value {
    let mut out = serde_json::Map::new();
    for (date, status) in record {
        if scope.contains(date) {
            out.insert(date.clone(), json!(status.as_str()));
        }
    }
    Value::Object(out)
}

fn attendance_get(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let scope = parse_scope(params)?;
    require_student(ctx, &student_id)?;
    let record = ctx
        .attendance_get(&student_id)
        .map_err(db_err("db_query_failed"))?;
    Ok(json!({ "studentId": student_id, "record": record_json(&record, scope) }))
}

fn attendance_set(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_date(params)?;
    let status = match get_optional_str(params, "status")? {
        None => None,
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(
            Status::parse(s.trim())
                .ok_or_else(|| HandlerErr::bad_params("status must be Present, Absent or Late"))?,
        ),
    };
    require_student(ctx, &student_id)?;
    ctx.attendance_set(&student_id, &date, status)
        .map_err(db_err("db_update_failed"))?;
    Ok(json!({ "date": date, "status": status_json(status) }))
}

fn attendance_cycle(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_date(params)?;
    require_student(ctx, &student_id)?;
    let record = ctx
        .attendance_get(&student_id)
        .map_err(db_err("db_query_failed"))?;
    let next = Status::cycle(record.get(&date).copied());
    ctx.attendance_set(&student_id, &date, next)
        .map_err(db_err("db_update_failed"))?;
    Ok(json!({ "date": date, "status": status_json(next) }))
}

fn attendance_summary(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let scope = parse_scope(params)?;
    require_student(ctx, &student_id)?;
    let record = ctx
        .attendance_get(&student_id)
        .map_err(db_err("db_query_failed"))?;

    let summary = attendance::aggregate(&record, scope);
    let mut out = json!(summary);
    if let Scope::Month { year, month } = scope {
        let layout = attendance::month_layout(year, month)
            .ok_or_else(|| HandlerErr::bad_params("month out of range"))?;
        let days: Vec<Value> = attendance::month_dates(year, month)
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let status = record.get(&date).copied();
                json!({ "day": i + 1, "date": date, "status": status_json(status) })
            })
            .collect();
        out["layout"] = json!(layout);
        out["days"] = json!(days);
    }
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "attendance.get" => attendance_get,
        "attendance.set" => attendance_set,
        "attendance.cycle" => attendance_cycle,
        "attendance.summary" => attendance_summary,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
