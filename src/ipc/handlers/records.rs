//! Operations shared by every resource handler: list, get, leaf delete,
//! insert/update with error mapping, reference resolution and CSV upload.

use crate::ingest::batch::STATUS_BAD_REQUEST;
use crate::ingest::resolve::{resolve, ResolveError};
use crate::ingest::{self, RowImport};
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::setup;
use crate::ipc::params;
use crate::store::{self, ForeignKey, Record};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

pub fn to_json<T: Serialize>(v: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("internal", e.to_string()))
}

/// At most one of `filters` may be supplied; none lists everything.
pub fn list<R: RowImport>(
    conn: &Connection,
    p: &Value,
    filters: &[(&str, ForeignKey)],
) -> Result<Value, HandlerErr> {
    let mut chosen = None;
    for (key, fk) in filters {
        if let Some(id) = params::optional_identity(p, key)? {
            if chosen.is_some() {
                let names: Vec<&str> = filters.iter().map(|(k, _)| *k).collect();
                return Err(HandlerErr::bad_params(format!(
                    "only one of {} may be given",
                    names.join(", ")
                )));
            }
            chosen = Some((*fk, id));
        }
    }
    let rows: Vec<R> = match chosen {
        Some((fk, id)) => store::find_by_foreign_key::<R>(conn, fk, id),
        None => store::find_all::<R>(conn),
    }
    .map_err(|e| HandlerErr::db("db_query_failed", R::TABLE, e))?;
    let mut out = json!({});
    out[R::RESOURCE] = to_json(&rows)?;
    Ok(out)
}

pub fn fetch<R: Record>(conn: &Connection, id: i64) -> Result<R, HandlerErr> {
    store::find_by_id::<R>(conn, id)
        .map_err(|e| HandlerErr::db("db_query_failed", R::TABLE, e))?
        .ok_or_else(|| HandlerErr::not_found(R::ENTITY, R::ID_FIELD, id))
}

pub fn get<R: Record + Serialize>(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, R::ID_FIELD)?;
    to_json(&fetch::<R>(conn, id)?)
}

pub fn insert<R: Record + Serialize>(conn: &Connection, record: R) -> Result<Value, HandlerErr> {
    let saved = store::save(conn, record).map_err(|e| HandlerErr::db("db_insert_failed", R::TABLE, e))?;
    tracing::debug!(table = R::TABLE, id = saved.id(), "record created");
    to_json(&saved)
}

/// Overwrites the row named by the identity param; the payload never
/// chooses its own identity.
pub fn replace<R: Record + Serialize>(
    conn: &Connection,
    id: i64,
    mut record: R,
) -> Result<Value, HandlerErr> {
    record.set_id(id);
    match store::save(conn, record) {
        Ok(saved) => to_json(&saved),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(HandlerErr::not_found(R::ENTITY, R::ID_FIELD, id)),
        Err(e) => Err(HandlerErr::db("db_update_failed", R::TABLE, e)),
    }
}

/// Deletes a row nothing else points at.
pub fn delete_leaf<R: Record>(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, R::ID_FIELD)?;
    let removed =
        store::delete_by_id::<R>(conn, id).map_err(|e| HandlerErr::db("db_delete_failed", R::TABLE, e))?;
    if !removed {
        return Err(HandlerErr::not_found(R::ENTITY, R::ID_FIELD, id));
    }
    Ok(json!({ "ok": true }))
}

/// Resolves the reference named `key` in the request body to an existing
/// row's identity.
pub fn reference<R: Record>(conn: &Connection, p: &Value, key: &'static str) -> Result<i64, HandlerErr> {
    let raw = params::reference_text(p, key)?;
    match resolve(&raw, key, |id| store::find_by_id::<R>(conn, id)) {
        Ok(found) => Ok(found.id().unwrap_or_default()),
        Err(e @ ResolveError::Unresolved { .. }) => Err(HandlerErr::invalid_reference(e.to_string())),
        Err(ResolveError::Store(e)) => Err(HandlerErr::db("db_query_failed", R::TABLE, e)),
    }
}

/// Builds a record from the request body after swapping each reference
/// field for its resolved identity.
pub fn body_with_refs(p: &Value, resolved: &[(&str, i64)]) -> Value {
    let mut body = p.clone();
    if let Some(obj) = body.as_object_mut() {
        for (key, id) in resolved {
            obj.insert(key.to_string(), json!(id));
        }
    }
    body
}

pub fn upload<T: RowImport>(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let text = params::upload_text(p)?;
    let policy = setup::enum_policy(conn)?;
    match ingest::run_upload::<T>(conn, &text, policy) {
        Ok(outcome) => Ok(outcome.to_json(T::RESOURCE)),
        Err(rejected) => Err(HandlerErr::new("bad_upload", rejected.to_string())
            .with_details(json!({ "status": STATUS_BAD_REQUEST }))),
    }
}
