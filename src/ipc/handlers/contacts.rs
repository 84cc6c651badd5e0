use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Contact, Student};
use crate::store::{ForeignKey, Record};
use rusqlite::Connection;
use serde_json::Value;

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn list(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    records::list::<Contact>(conn, p, &[("studentNumber", ForeignKey::Student)])
}

fn build(conn: &Connection, p: &Value) -> Result<Contact, HandlerErr> {
    let student = records::reference::<Student>(conn, p, "studentNumber")?;
    params::payload(&records::body_with_refs(p, &[("studentNumber", student)]))
}

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let contact = build(conn, p)?;
    records::insert(conn, contact)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Contact::ID_FIELD)?;
    records::fetch::<Contact>(conn, id)?;
    let contact = build(conn, p)?;
    records::replace(conn, id, contact)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "contacts.list" => list,
        "contacts.get" => records::get::<Contact>,
        "contacts.create" => create,
        "contacts.update" => update,
        "contacts.delete" => records::delete_leaf::<Contact>,
        "contacts.uploadCsv" => records::upload::<Contact>,
        _ => return None,
    };
    let result = params::conn(state).and_then(|conn| handler(conn, &req.params));
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store::fixtures;
    use serde_json::json;

    #[test]
    fn duplicate_email_is_a_store_failure() {
        let conn = open_in_memory();
        let s = fixtures::student(&conn, "Cy").student_number.unwrap();
        create(&conn, &json!({ "studentNumber": s, "emailAddress": "cy@example.com", "mobileNumber": "1" }))
            .unwrap();
        let e = create(&conn, &json!({ "studentNumber": s, "emailAddress": "cy@example.com", "mobileNumber": "2" }))
            .unwrap_err();
        assert_eq!(e.code, "db_insert_failed");
        assert_eq!(e.details.unwrap()["table"], "contacts");
    }
}
