use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    db_err, get_optional_str, get_required_text, with_store, HandlerErr, StoreHandler,
};
use crate::ipc::types::{AppState, Request};
use crate::notify;
use crate::progress;
use crate::store::StoreCtx;
use serde_json::{json, Value};

/// Looks a student up by exact name. Sections are searched in stored order
/// and the first active match wins; `sectionId` narrows the search.
fn progress_view(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_text(params, "name")?;
    let section_filter = get_optional_str(params, "sectionId")?;

    let mut matches = ctx
        .find_students_by_name(&name)
        .map_err(db_err("db_query_failed"))?;
    if let Some(section_id) = section_filter.as_deref() {
        matches.retain(|m| m.section_id == section_id);
    }
    if matches.is_empty() {
        tracing::debug!(name = %name, "progress lookup found no student");
        return Ok(json!({ "found": false }));
    }
    let other_matches = matches.len() - 1;
    let hit = matches.swap_remove(0);

    let record = ctx
        .attendance_get(&hit.student.id)
        .map_err(db_err("db_query_failed"))?;
    let input = ctx
        .grade_input_get(&hit.section_id, &hit.student.id)
        .map_err(db_err("db_query_failed"))?;
    let result = progress::evaluate(&hit.section_name, &hit.student.name, &record, &input);
    tracing::debug!(
        student_id = %hit.student.id,
        final_grade = result.final_grade(),
        triggers = result.triggers.len(),
        "progress evaluated"
    );

    let sent = if setup::notifications_enabled(ctx).map_err(db_err("db_query_failed"))? {
        let mut sink = *ctx;
        notify::dispatch(&mut sink, &result).map_err(db_err("db_insert_failed"))?
    } else {
        Vec::new()
    };

    Ok(json!({
        "found": true,
        "sectionId": hit.section_id,
        "studentId": hit.student.id,
        "otherMatches": other_matches,
        "progress": result,
        "notifications": sent
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "progress.view" => progress_view,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
