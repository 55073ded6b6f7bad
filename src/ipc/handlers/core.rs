use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Session;
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "user": state.session.user()
        }),
    )
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    tracing::info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return respond(&req.id, Err(HandlerErr::bad_params("missing params.path")));
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => respond(
            &req.id,
            Err(HandlerErr::new("db_open_failed", format!("{e:#}"))),
        ),
    }
}

fn handle_session_set_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match get_optional_str(&req.params, "user") {
        Ok(v) => v,
        Err(e) => return respond(&req.id, Err(e)),
    };
    state.session = Session::new(user.as_deref());
    tracing::info!(user = state.session.owner(), "session user set");
    ok(&req.id, json!({ "user": state.session.user() }))
}

fn handle_session_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "user": state.session.user() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.setUser" => Some(handle_session_set_user(state, req)),
        "session.get" => Some(handle_session_get(state, req)),
        _ => None,
    }
}
