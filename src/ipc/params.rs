use super::error::HandlerErr;
use super::types::AppState;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

pub fn conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(HandlerErr::no_workspace)
}

/// Identity params arrive as a JSON integer or a digit string.
pub fn optional_identity(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("{} must be an integer", key))),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn identity(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    optional_identity(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Reference fields are handed to the resolver as text, so a non-numeric
/// value surfaces as an unresolved reference rather than a type error.
pub fn reference_text(params: &Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn payload<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone()).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

/// CSV body from `csvText`, or read whole from `inPath`.
pub fn upload_text(params: &Value) -> Result<String, HandlerErr> {
    if let Some(text) = params.get("csvText").and_then(|v| v.as_str()) {
        return Ok(text.to_string());
    }
    let in_path = params
        .get("inPath")
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing csvText or inPath"))?;
    std::fs::read_to_string(&in_path).map_err(|e| {
        HandlerErr::new("upload_read_failed", e.to_string()).with_details(json!({ "path": in_path }))
    })
}
