use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Enrollment, Grade};
use crate::store::{ForeignKey, Record};
use rusqlite::Connection;
use serde_json::Value;

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn list(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    records::list::<Grade>(conn, p, &[("enrollmentNumber", ForeignKey::Enrollment)])
}

fn build(conn: &Connection, p: &Value) -> Result<Grade, HandlerErr> {
    let enrollment = records::reference::<Enrollment>(conn, p, "enrollmentNumber")?;
    params::payload(&records::body_with_refs(p, &[("enrollmentNumber", enrollment)]))
}

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let grade = build(conn, p)?;
    records::insert(conn, grade)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Grade::ID_FIELD)?;
    records::fetch::<Grade>(conn, id)?;
    let grade = build(conn, p)?;
    records::replace(conn, id, grade)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "grades.list" => list,
        "grades.get" => records::get::<Grade>,
        "grades.create" => create,
        "grades.update" => update,
        "grades.delete" => records::delete_leaf::<Grade>,
        "grades.uploadCsv" => records::upload::<Grade>,
        _ => return None,
    };
    let result = params::conn(state).and_then(|conn| handler(conn, &req.params));
    Some(respond(&req.id, result))
}
