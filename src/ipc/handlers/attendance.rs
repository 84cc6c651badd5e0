use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Attendance, Enrollment, Student};
use crate::store::{ForeignKey, Record};
use rusqlite::Connection;
use serde_json::Value;

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn list(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    records::list::<Attendance>(
        conn,
        p,
        &[
            ("studentNumber", ForeignKey::Student),
            ("enrollmentNumber", ForeignKey::Enrollment),
        ],
    )
}

fn build(conn: &Connection, p: &Value) -> Result<Attendance, HandlerErr> {
    let student = records::reference::<Student>(conn, p, "studentNumber")?;
    let enrollment = records::reference::<Enrollment>(conn, p, "enrollmentNumber")?;
    params::payload(&records::body_with_refs(
        p,
        &[("studentNumber", student), ("enrollmentNumber", enrollment)],
    ))
}

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let attendance = build(conn, p)?;
    records::insert(conn, attendance)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Attendance::ID_FIELD)?;
    records::fetch::<Attendance>(conn, id)?;
    let attendance = build(conn, p)?;
    records::replace(conn, id, attendance)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "attendance.list" => list,
        "attendance.get" => records::get::<Attendance>,
        "attendance.create" => create,
        "attendance.update" => update,
        "attendance.delete" => records::delete_leaf::<Attendance>,
        "attendance.uploadCsv" => records::upload::<Attendance>,
        _ => return None,
    };
    let result = params::conn(state).and_then(|conn| handler(conn, &req.params));
    Some(respond(&req.id, result))
}
