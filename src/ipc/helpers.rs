pub use crate::ipc::error::HandlerErr;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::store::StoreCtx;
use serde_json::Value;

/// Map a store failure onto an error code, e.g. `.map_err(db_err("db_query_failed"))`.
pub fn db_err(code: &'static str) -> impl FnOnce(anyhow::Error) -> HandlerErr {
    move |e| HandlerErr::new(code, format!("{e:#}"))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Required, trimmed and non-empty.
pub fn get_required_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, key)?;
    let t = raw.trim();
    if t.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(t.to_string())
}

pub fn get_optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::warn!(id, code = e.code, message = %e.message, "request failed");
            e.response(id)
        }
    }
}

pub type StoreHandler = fn(&StoreCtx<'_>, &Value) -> Result<Value, HandlerErr>;

/// Run a handler against the open workspace under the current session.
pub fn with_store(state: &AppState, req: &Request, run: StoreHandler) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return respond(
            &req.id,
            Err(HandlerErr::new("no_workspace", "select a workspace first")),
        );
    };
    let ctx = StoreCtx::new(conn, &state.session);
    respond(&req.id, run(&ctx, &req.params))
}
