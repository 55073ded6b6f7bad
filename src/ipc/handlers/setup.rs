use crate::db;
use crate::ipc::helpers::{db_err, get_required_str, with_store, HandlerErr, StoreHandler};
use crate::ipc::types::{AppState, Request};
use crate::store::{StoreCtx, StudentSort};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Notifications,
    ClassRecord,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "notifications" => Some(Self::Notifications),
            "classRecord" => Some(Self::ClassRecord),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Notifications => "setup.notifications",
            Self::ClassRecord => "setup.classRecord",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Notifications => json!({
            "enabled": true,
            "bannerSeconds": 8
        }),
        SetupSection::ClassRecord => json!({
            "studentSort": "genderThenName",
            "attendanceView": "month"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_choice(v: &Value, key: &str, choices: &[&str]) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(s))
        .map(|c| c.to_string())
        .ok_or_else(|| format!("{} must be one of: {}", key, choices.join(", ")))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Notifications => match k.as_str() {
                "enabled" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "bannerSeconds" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 60)?));
                }
                _ => return Err(format!("unknown notifications field: {}", k)),
            },
            SetupSection::ClassRecord => match k.as_str() {
                "studentSort" => {
                    let s = parse_choice(v, k, &["genderThenName", "name"])?;
                    obj.insert(k.clone(), Value::String(s));
                }
                "attendanceView" => {
                    let s = parse_choice(v, k, &["month", "allTime"])?;
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown classRecord field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(ctx: &StoreCtx<'_>, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(ctx.conn, ctx.session.owner(), section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stale or malformed saved fields fall back to defaults.
            if merge_section_patch(section, &mut current, saved_obj).is_err() {
                tracing::warn!(key = section.key(), "ignoring invalid saved settings");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Saved roster order for the session, `genderThenName` when unset.
pub fn student_sort(ctx: &StoreCtx<'_>) -> anyhow::Result<StudentSort> {
    let section = load_section(ctx, SetupSection::ClassRecord)?;
    Ok(section
        .get("studentSort")
        .and_then(|v| v.as_str())
        .and_then(StudentSort::parse)
        .unwrap_or(StudentSort::GenderThenName))
}

pub fn notifications_enabled(ctx: &StoreCtx<'_>) -> anyhow::Result<bool> {
    let section = load_section(ctx, SetupSection::Notifications)?;
    Ok(section
        .get("enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(true))
}

fn setup_get(ctx: &StoreCtx<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let notifications =
        load_section(ctx, SetupSection::Notifications).map_err(db_err("db_query_failed"))?;
    let class_record =
        load_section(ctx, SetupSection::ClassRecord).map_err(db_err("db_query_failed"))?;
    Ok(json!({
        "notifications": notifications,
        "classRecord": class_record
    }))
}

fn setup_update(ctx: &StoreCtx<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let section_raw = get_required_str(params, "section")?;
    let section = SetupSection::parse(&section_raw)
        .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = load_section(ctx, section).map_err(db_err("db_query_failed"))?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(ctx.conn, ctx.session.owner(), section.key(), &current)
        .map_err(db_err("db_update_failed"))?;
    Ok(json!({ "ok": true, "section": section_raw, "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run: StoreHandler = match req.method.as_str() {
        "setup.get" => setup_get,
        "setup.update" => setup_update,
        _ => return None,
    };
    Some(with_store(state, req, run))
}
