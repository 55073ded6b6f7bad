use crate::ipc::helpers::{
    db_err, get_required_str, get_required_text, with_store, HandlerErr, StoreHandler,
};
use crate::ipc::types::{AppState, Request};
use crate::store::StoreCtx;
use serde_json::{json, Value};

fn sections_list(ctx: &StoreCtx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let sections = ctx.sections_list().map_err(db_err("db_query_failed"))?;
    Ok(json!({ "sections": sections }))
}

fn sections_create(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_text(params, "name")?;
    let section_id = ctx
        .section_create(&name)
        .map_err(|e| db_err("db_insert_failed")(e).with_details(json!({ "table": "sections" })))?;
    tracing::info!(section_id = %section_id, "section created");
    Ok(json!({ "sectionId": section_id, "name": name }))
}

fn sections_rename(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let name = get_required_text(params, "name")?;
    let found = ctx
        .section_rename(&section_id, &name)
        .map_err(db_err("db_update_failed"))?;
    if !found {
        return Err(HandlerErr::not_found("section not found"));
    }
    Ok(json!({ "ok": true }))
}

fn sections_delete(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let Some(students_deleted) = ctx
        .section_delete(&section_id)
        .map_err(db_err("db_delete_failed"))?
    else {
        return Err(HandlerErr::not_found("section not found"));
    };
    tracing::info!(section_id = %section_id, students_deleted, "section deleted");
    Ok(json!({ "ok": true, "studentsDeleted": students_deleted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "sections.list" => sections_list,
        "sections.create" => sections_create,
        "sections.rename" => sections_rename,
        "sections.delete" => sections_delete,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
