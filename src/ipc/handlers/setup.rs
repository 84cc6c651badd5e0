use crate::aggregate::CoursePolicy;
use crate::db;
use crate::ingest::EnumPolicy;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Ingest,
    Aggregate,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ingest" => Some(Self::Ingest),
            "aggregate" => Some(Self::Aggregate),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Ingest => "setup.ingest",
            Self::Aggregate => "setup.aggregate",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Ingest => json!({
            "unknownEnumPolicy": "fallback"
        }),
        SetupSection::Aggregate => json!({
            "unresolvedCoursePolicy": "skip"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_choice(v: &Value, key: &str, allowed: &[&str]) -> Result<String, String> {
    let s = v
        .as_str()
        .ok_or_else(|| format!("{} must be string", key))?
        .trim()
        .to_ascii_lowercase();
    if !allowed.contains(&s.as_str()) {
        return Err(format!("{} must be one of: {}", key, allowed.join(", ")));
    }
    Ok(s)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Ingest => match k.as_str() {
                "unknownEnumPolicy" => {
                    let s = parse_choice(v, k, &["fallback", "reject"])?;
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown ingest field: {}", k)),
            },
            SetupSection::Aggregate => match k.as_str() {
                "unresolvedCoursePolicy" => {
                    let s = parse_choice(v, k, &["skip", "reject"])?;
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown aggregate field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn load_str(
    conn: &rusqlite::Connection,
    section: SetupSection,
    field: &str,
) -> Result<String, HandlerErr> {
    let v = load_section(conn, section).map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(v.get(field).and_then(|x| x.as_str()).unwrap_or_default().to_string())
}

pub fn enum_policy(conn: &rusqlite::Connection) -> Result<EnumPolicy, HandlerErr> {
    let s = load_str(conn, SetupSection::Ingest, "unknownEnumPolicy")?;
    Ok(EnumPolicy::parse(&s).unwrap_or(EnumPolicy::Fallback))
}

pub fn course_policy(conn: &rusqlite::Connection) -> Result<CoursePolicy, HandlerErr> {
    let s = load_str(conn, SetupSection::Aggregate, "unresolvedCoursePolicy")?;
    Ok(CoursePolicy::parse(&s).unwrap_or(CoursePolicy::Skip))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let ingest = match load_section(conn, SetupSection::Ingest) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let aggregate = match load_section(conn, SetupSection::Aggregate) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "ingest": ingest,
            "aggregate": aggregate
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section_raw, value = %current, "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
