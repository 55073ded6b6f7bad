use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    db_err, get_optional_str, get_required_str, get_required_text, with_store, HandlerErr,
    StoreHandler,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{Gender, StoreCtx, StudentPatch, StudentSort};
use serde_json::{json, Value};

fn parse_gender(raw: &str) -> Result<Gender, HandlerErr> {
    Gender::parse(raw).ok_or_else(|| HandlerErr::bad_params("gender must be Male or Female"))
}

fn optional_text(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match get_optional_str(params, key)? {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => {
            Err(HandlerErr::bad_params(format!("{} must not be empty", key)))
        }
        Some(s) => Ok(Some(s.trim().to_string())),
    }
}

pub(crate) fn require_section(ctx: &StoreCtx<'_>, section_id: &str) -> Result<String, HandlerErr> {
    ctx.section_get(section_id)
        .map_err(db_err("db_query_failed"))?
        .map(|s| s.name)
        .ok_or_else(|| HandlerErr::not_found("section not found"))
}

/// Explicit `sort` param, else the user's saved default.
pub(crate) fn resolve_sort(ctx: &StoreCtx<'_>, params: &Value) -> Result<StudentSort, HandlerErr> {
    match get_optional_str(params, "sort")? {
        Some(s) => StudentSort::parse(&s)
            .ok_or_else(|| HandlerErr::bad_params("sort must be genderThenName or name")),
        None => setup::student_sort(ctx).map_err(db_err("db_query_failed")),
    }
}

fn students_list(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    require_section(ctx, &section_id)?;
    let sort = resolve_sort(ctx, params)?;
    let students = ctx
        .students_list(&section_id, sort)
        .map_err(db_err("db_query_failed"))?;
    Ok(json!({ "students": students }))
}

fn students_create(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let name = get_required_text(params, "name")?;
    let lrn = get_required_text(params, "lrn")?;
    let gender = parse_gender(&get_required_str(params, "gender")?)?;
    require_section(ctx, &section_id)?;

    let student_id = ctx
        .student_create(&section_id, &name, &lrn, gender)
        .map_err(|e| db_err("db_insert_failed")(e).with_details(json!({ "table": "students" })))?;
    Ok(json!({ "studentId": student_id }))
}

fn students_update(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let patch = StudentPatch {
        name: optional_text(params, "name")?,
        lrn: optional_text(params, "lrn")?,
        gender: match get_optional_str(params, "gender")? {
            Some(g) => Some(parse_gender(&g)?),
            None => None,
        },
    };
    let found = ctx
        .student_update(&section_id, &student_id, &patch)
        .map_err(db_err("db_update_failed"))?;
    if !found {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let student_id = get_required_str(params, "studentId")?;
    let removed = ctx
        .student_remove(&section_id, &student_id)
        .map_err(db_err("db_update_failed"))?;
    if !removed {
        return Err(HandlerErr::not_found("student not found"));
    }
    tracing::info!(student_id = %student_id, "student removed, records retained");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
