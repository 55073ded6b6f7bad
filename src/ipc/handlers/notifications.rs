use crate::ipc::helpers::{db_err, with_store, HandlerErr, StoreHandler};
use crate::ipc::types::{AppState, Request};
use crate::store::StoreCtx;
use serde_json::{json, Value};

fn notifications_list(ctx: &StoreCtx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let list = ctx
        .notifications_list()
        .map_err(db_err("db_query_failed"))?;
    Ok(json!({ "notifications": list }))
}

fn notifications_clear(ctx: &StoreCtx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let removed = ctx
        .notifications_clear()
        .map_err(db_err("db_delete_failed"))?;
    Ok(json!({ "ok": true, "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "notifications.list" => notifications_list,
        "notifications.clear" => notifications_clear,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
