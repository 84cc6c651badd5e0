use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Address, Student};
use crate::store::{ForeignKey, Record};
use rusqlite::Connection;
use serde_json::Value;

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn list(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    records::list::<Address>(conn, p, &[("studentNumber", ForeignKey::Student)])
}

fn build(conn: &Connection, p: &Value) -> Result<Address, HandlerErr> {
    let student = records::reference::<Student>(conn, p, "studentNumber")?;
    params::payload(&records::body_with_refs(p, &[("studentNumber", student)]))
}

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let address = build(conn, p)?;
    records::insert(conn, address)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Address::ID_FIELD)?;
    records::fetch::<Address>(conn, id)?;
    let address = build(conn, p)?;
    records::replace(conn, id, address)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "addresses.list" => list,
        "addresses.get" => records::get::<Address>,
        "addresses.create" => create,
        "addresses.update" => update,
        "addresses.delete" => records::delete_leaf::<Address>,
        "addresses.uploadCsv" => records::upload::<Address>,
        _ => return None,
    };
    let result = params::conn(state).and_then(|conn| handler(conn, &req.params));
    Some(respond(&req.id, result))
}
