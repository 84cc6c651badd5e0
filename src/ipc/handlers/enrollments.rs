use crate::cascade::{self, CascadeError};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::records;
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, Enrollment, Student};
use crate::store::{ForeignKey, Record};
use rusqlite::Connection;
use serde_json::{json, Value};

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

fn list(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    records::list::<Enrollment>(conn, p, &[("studentNumber", ForeignKey::Student)])
}

fn build(conn: &Connection, p: &Value) -> Result<Enrollment, HandlerErr> {
    let student = records::reference::<Student>(conn, p, "studentNumber")?;
    let course = records::reference::<Course>(conn, p, "courseNumber")?;
    params::payload(&records::body_with_refs(
        p,
        &[("studentNumber", student), ("courseNumber", course)],
    ))
}

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let enrollment = build(conn, p)?;
    records::insert(conn, enrollment)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Enrollment::ID_FIELD)?;
    records::fetch::<Enrollment>(conn, id)?;
    let enrollment = build(conn, p)?;
    records::replace(conn, id, enrollment)
}

fn delete(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Enrollment::ID_FIELD)?;
    match cascade::delete_enrollment(conn, id) {
        Ok(report) => Ok(json!({ "deleted": records::to_json(&report)? })),
        Err(CascadeError::NotFound { .. }) => {
            Err(HandlerErr::not_found(Enrollment::ENTITY, Enrollment::ID_FIELD, id))
        }
        Err(CascadeError::Store(e)) => Err(HandlerErr::db("db_delete_failed", Enrollment::TABLE, e)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "enrollments.list" => list,
        "enrollments.get" => records::get::<Enrollment>,
        "enrollments.create" => create,
        "enrollments.update" => update,
        "enrollments.delete" => delete,
        "enrollments.uploadCsv" => records::upload::<Enrollment>,
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

    fn body(student: Value, course: Value) -> Value {
        json!({
            "studentNumber": student,
            "courseNumber": course,
            "enrollmentDate": "2024-09-10",
            "overallGrade": 77,
            "semester": "FALL24",
            "instructorName": "Prof. Hilbert"
        })
    }

    #[test]
    fn create_resolves_both_references() {
        let conn = open_in_memory();
        let s = fixtures::student(&conn, "Tia").student_number.unwrap();
        let c = fixtures::course(&conn, "LOG1").course_number.unwrap();
        let out = create(&conn, &body(json!(s.to_string()), json!(c))).unwrap();
        assert_eq!(out["studentNumber"], s);
        assert_eq!(out["courseNumber"], c);
        assert!(out["enrollmentNumber"].as_i64().is_some());

        let e = create(&conn, &body(json!(s), json!(404))).unwrap_err();
        assert_eq!(e.code, "invalid_reference");
    }
}
