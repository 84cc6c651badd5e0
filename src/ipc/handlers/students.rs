use crate::aggregate::{self, AggregateError, AggregateRequest};
use crate::cascade::{self, CascadeError};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::{records, setup};
use crate::ipc::params;
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store::Record;
use rusqlite::Connection;
use serde_json::{json, Value};

type Handler = fn(&Connection, &Value) -> Result<Value, HandlerErr>;

const PATCHABLE: &[&str] = &[
    "firstName",
    "lastName",
    "dateOfBirth",
    "gender",
    "joiningDate",
    "studentStatus",
];

fn create(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let student: Student = params::payload(p)?;
    records::insert(conn, student)
}

fn update(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Student::ID_FIELD)?;
    let student: Student = params::payload(p)?;
    records::replace(conn, id, student)
}

/// Applies only the supplied fields over the stored student.
fn patch(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Student::ID_FIELD)?;
    let Some(changes) = p.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let current = records::fetch::<Student>(conn, id)?;
    let mut merged = records::to_json(&current)?;
    if let Some(obj) = merged.as_object_mut() {
        for (k, v) in changes {
            if !PATCHABLE.contains(&k.as_str()) {
                return Err(HandlerErr::bad_params(format!("unknown student field: {}", k)));
            }
            obj.insert(k.clone(), v.clone());
        }
    }
    let student: Student = params::payload(&merged)?;
    records::replace(conn, id, student)
}

fn delete(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let id = params::identity(p, Student::ID_FIELD)?;
    match cascade::delete_student(conn, id) {
        Ok(report) => Ok(json!({ "deleted": records::to_json(&report)? })),
        Err(CascadeError::NotFound { .. }) => {
            Err(HandlerErr::not_found(Student::ENTITY, Student::ID_FIELD, id))
        }
        Err(CascadeError::Store(e)) => Err(HandlerErr::db("db_delete_failed", Student::TABLE, e)),
    }
}

fn create_aggregate(conn: &Connection, p: &Value) -> Result<Value, HandlerErr> {
    let req: AggregateRequest = params::payload(p)?;
    let policy = setup::course_policy(conn)?;
    match aggregate::create_student_aggregate(conn, req, policy) {
        Ok(out) => records::to_json(&out.student),
        Err(e @ AggregateError::Blank(_)) => Err(HandlerErr::bad_params(e.to_string())),
        Err(e @ AggregateError::UnresolvedCourse { .. }) => {
            Err(HandlerErr::invalid_reference(e.to_string()))
        }
        Err(AggregateError::Store(e)) => Err(HandlerErr::db("db_insert_failed", Student::TABLE, e)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "students.list" => |c, p| records::list::<Student>(c, p, &[]),
        "students.get" => records::get::<Student>,
        "students.create" => create,
        "students.update" => update,
        "students.patch" => patch,
        "students.delete" => delete,
        "students.uploadCsv" => records::upload::<Student>,
        "students.createAggregate" => create_aggregate,
        _ => return None,
    };
    let result = params::conn(state).and_then(|conn| handler(conn, &req.params));
    Some(respond(&req.id, result))
}
