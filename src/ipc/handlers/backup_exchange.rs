use crate::backup;
use crate::calc;
use crate::db;
use crate::ipc::handlers::students::{require_section, resolve_sort};
use crate::ipc::helpers::{
    db_err, get_optional_str, get_required_str, get_required_text, respond, with_store,
    HandlerErr, StoreHandler,
};
use crate::ipc::types::{AppState, Request};
use crate::store::StoreCtx;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const CSV_HEADER: &str =
    "student_id,name,lrn,gender,ww_total,pt_total,qa_total,raw_final_grade,final_grade,remarks\n";

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn io_err(e: impl std::fmt::Display, path: &Path) -> HandlerErr {
    HandlerErr::new("io_failed", e.to_string())
        .with_details(json!({ "path": path.to_string_lossy() }))
}

fn target_workspace(state: &AppState, params: &Value) -> Result<PathBuf, HandlerErr> {
    get_optional_str(params, "workspacePath")?
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn backup_export(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_text(params, "outPath")?);
    let workspace_path = target_workspace(state, params)?;

    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
            tracing::warn!(error = %e, "wal checkpoint before export failed");
        }
    }

    let export = backup::export_workspace_bundle(&workspace_path, &out_path)
        .map_err(|e| io_err(format!("{e:#}"), &out_path))?;
    tracing::info!(
        path = %out_path.display(),
        sha256 = %export.sha256,
        "workspace bundle exported"
    );
    Ok(json!({
        "ok": true,
        "path": out_path.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "sha256": export.sha256
    }))
}

fn backup_import(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let src = PathBuf::from(get_required_text(params, "inPath")?);
    let workspace_path = target_workspace(state, params)?;
    if !src.is_file() {
        return Err(HandlerErr::not_found("bundle file not found")
            .with_details(json!({ "path": src.to_string_lossy() })));
    }
    std::fs::create_dir_all(&workspace_path).map_err(|e| io_err(e, &workspace_path))?;

    // The open handle must be released before the file is replaced.
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            // Leave the previous workspace usable when the bundle is rejected.
            if let Some(ws) = state.workspace.clone() {
                state.db = db::open_db(&ws).ok();
            }
            return Err(io_err(format!("{e:#}"), &src));
        }
    };

    let conn = db::open_db(&workspace_path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    state.workspace = Some(workspace_path.clone());
    state.db = Some(conn);
    tracing::info!(
        workspace = %workspace_path.display(),
        format = %import.bundle_format_detected,
        "workspace bundle imported"
    );
    Ok(json!({
        "ok": true,
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormatDetected": import.bundle_format_detected
    }))
}

fn fmt_num(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    rounded.to_string()
}

fn exchange_export_section_csv(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_id = get_required_str(params, "sectionId")?;
    let out_path = PathBuf::from(get_required_text(params, "outPath")?);
    require_section(ctx, &section_id)?;
    let sort = resolve_sort(ctx, params)?;
    let students = ctx
        .students_list(&section_id, sort)
        .map_err(db_err("db_query_failed"))?;

    let mut csv = String::from(CSV_HEADER);
    for s in &students {
        let input = ctx
            .grade_input_get(&section_id, &s.id)
            .map_err(db_err("db_query_failed"))?;
        let report = calc::grade_report(&input);
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            csv_quote(&s.id),
            csv_quote(&s.name),
            csv_quote(&s.lrn),
            s.gender.as_str(),
            fmt_num(report.ww.total),
            fmt_num(report.pt.total),
            fmt_num(report.qa.total),
            fmt_num(report.raw_final_grade),
            report.final_grade,
            if report.passed() { "PASSED" } else { "FAILED" }
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(e, &out_path))?;
    }
    std::fs::write(&out_path, csv).map_err(|e| io_err(e, &out_path))?;

    Ok(json!({
        "ok": true,
        "rowsExported": students.len(),
        "path": out_path.to_string_lossy()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => backup_export(state, &req.params),
        "backup.importWorkspaceBundle" => backup_import(state, &req.params),
        "exchange.exportSectionCsv" => {
            let run: StoreHandler = exchange_export_section_csv;
            return Some(with_store(state, req, run));
        }
        _ => return None,
    };
    Some(respond(&req.id, result))
}
