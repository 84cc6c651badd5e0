use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, Enrollment};
use crate::store::{self, ForeignKey, Record};
use rusqlite::Connection;
use serde_json::{json, Value};

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let course: Course = params::payload(p)?;
    records::insert(conn, course)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Course::ID_FIELD)?;
    let course: Course = params::payload(p)?;
    records::replace(conn, id, course)
}

/// Courses are never cascaded: a referenced course stays.
fn delete(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Course::ID_FIELD)?;
    records::fetch::<Course>(conn, id)?;
    let n = store::count_by_foreign_key::<Enrollment>(conn, ForeignKey::Course, id)
        .map_err(|e| HandlerErr::db("db_query_failed", Enrollment::TABLE, e))?;
    if n > 0 {
        return Err(HandlerErr::new(
            "in_use",
            format!("Course is referenced by {} enrollment(s)", n),
        )
        .with_details(json!({ "status": 409, "enrollments": n })));
    }
    records::delete_leaf::<Course>(conn, p)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "courses.list" => |c, p| records::list::<Course>(c, p, &[]),
        "courses.get" => records::get::<Course>,
        "courses.create" => create,
        "courses.update" => update,
        "courses.delete" => delete,
        "courses.uploadCsv" => records::upload::<Course>,
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

    #[test]
    fn referenced_course_is_in_use() {
        let conn = open_in_memory();
        let s = fixtures::student(&conn, "Ivy").student_number.unwrap();
        let c = fixtures::course(&conn, "PHY1").course_number.unwrap();
        fixtures::enrollment(&conn, s, c, "FALL24");
        let e = delete(&conn, &json!({ "courseNumber": c })).unwrap_err();
        assert_eq!(e.code, "in_use");
        assert_eq!(e.details.unwrap()["status"], 409);
        assert!(records::fetch::<Course>(&conn, c).is_ok());
    }

    #[test]
    fn unreferenced_course_is_removed() {
        let conn = open_in_memory();
        let c = fixtures::course(&conn, "ART9").course_number.unwrap();
        delete(&conn, &json!({ "courseNumber": c })).unwrap();
        assert_eq!(records::fetch::<Course>(&conn, c).unwrap_err().code, "not_found");
    }
}
