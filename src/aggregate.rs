//! Student plus addresses, contacts and enrollments in one request.

use crate::ingest::resolve::{resolve, ResolveError};
use crate::model::{Address, Contact, Course, Enrollment, Gender, Student, StudentStatus};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;

/// What happens to an enrollment item whose course does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoursePolicy {
    /// Leave the item out and carry on.
    Skip,
    /// Fail the whole aggregate.
    Reject,
}

impl CoursePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "skip" => Some(CoursePolicy::Skip),
            "reject" => Some(CoursePolicy::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressItem {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactItem {
    pub email_address: String,
    pub mobile_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentItem {
    pub course_number: i64,
    pub enrollment_date: NaiveDate,
    pub overall_grade: i32,
    pub semester: String,
    pub instructor_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub joining_date: NaiveDate,
    pub student_status: StudentStatus,
    #[serde(default)]
    pub addresses: Vec<AddressItem>,
    #[serde(default)]
    pub contacts: Vec<ContactItem>,
    #[serde(default)]
    pub enrollments: Vec<EnrollmentItem>,
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("{0} must not be empty")]
    Blank(String),
    #[error("enrollments[{index}]: no course with courseNumber={course_number}")]
    UnresolvedCourse { index: usize, course_number: i64 },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

#[derive(Debug)]
pub struct AggregateOutcome {
    pub student: Student,
    pub addresses: Vec<Address>,
    pub contacts: Vec<Contact>,
    pub enrollments: Vec<Enrollment>,
    /// Positions in the request's enrollment list that were left out.
    pub skipped_enrollments: Vec<usize>,
}

fn non_blank(value: &str, path: impl FnOnce() -> String) -> Result<String, AggregateError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AggregateError::Blank(path()));
    }
    Ok(v.to_string())
}

/// Stores the student first, then each dependent in list order with the new
/// student number attached. Runs in one transaction: any error leaves nothing
/// behind.
pub fn create_student_aggregate(
    conn: &Connection,
    req: AggregateRequest,
    course_policy: CoursePolicy,
) -> Result<AggregateOutcome, AggregateError> {
    let tx = conn.unchecked_transaction()?;

    let student = store::save(
        &tx,
        Student {
            student_number: None,
            first_name: non_blank(&req.first_name, || "firstName".into())?,
            last_name: non_blank(&req.last_name, || "lastName".into())?,
            date_of_birth: req.date_of_birth,
            gender: req.gender,
            joining_date: req.joining_date,
            student_status: req.student_status,
        },
    )?;
    let student_number = student.student_number.unwrap_or_default();

    let mut addresses = Vec::with_capacity(req.addresses.len());
    for (i, a) in req.addresses.iter().enumerate() {
        let field = |name: &str| format!("addresses[{}].{}", i, name);
        addresses.push(store::save(
            &tx,
            Address {
                address_number: None,
                student_number,
                street: non_blank(&a.street, || field("street"))?,
                city: non_blank(&a.city, || field("city"))?,
                state: non_blank(&a.state, || field("state"))?,
                zip_code: non_blank(&a.zip_code, || field("zipCode"))?,
            },
        )?);
    }

    let mut contacts = Vec::with_capacity(req.contacts.len());
    for (i, c) in req.contacts.iter().enumerate() {
        let field = |name: &str| format!("contacts[{}].{}", i, name);
        contacts.push(store::save(
            &tx,
            Contact {
                contact_number: None,
                student_number,
                email_address: non_blank(&c.email_address, || field("emailAddress"))?,
                mobile_number: non_blank(&c.mobile_number, || field("mobileNumber"))?,
            },
        )?);
    }

    let mut enrollments = Vec::with_capacity(req.enrollments.len());
    let mut skipped_enrollments = Vec::new();
    for (i, e) in req.enrollments.iter().enumerate() {
        let raw = e.course_number.to_string();
        let course: Course = match resolve(&raw, "courseNumber", |id| store::find_by_id::<Course>(&tx, id)) {
            Ok(c) => c,
            Err(ResolveError::Unresolved { .. }) => match course_policy {
                CoursePolicy::Skip => {
                    tracing::debug!(
                        student_number,
                        index = i,
                        course_number = e.course_number,
                        "enrollment skipped, course not found"
                    );
                    skipped_enrollments.push(i);
                    continue;
                }
                CoursePolicy::Reject => {
                    return Err(AggregateError::UnresolvedCourse {
                        index: i,
                        course_number: e.course_number,
                    })
                }
            },
            Err(ResolveError::Store(err)) => return Err(err.into()),
        };
        let field = |name: &str| format!("enrollments[{}].{}", i, name);
        enrollments.push(store::save(
            &tx,
            Enrollment {
                enrollment_number: None,
                student_number,
                course_number: course.course_number.unwrap_or_default(),
                enrollment_date: e.enrollment_date,
                overall_grade: e.overall_grade,
                semester: non_blank(&e.semester, || field("semester"))?,
                instructor_name: non_blank(&e.instructor_name, || field("instructorName"))?,
            },
        )?);
    }

    tx.commit()?;
    tracing::info!(
        student_number,
        addresses = addresses.len(),
        contacts = contacts.len(),
        enrollments = enrollments.len(),
        skipped = skipped_enrollments.len(),
        "student aggregate created"
    );
    Ok(AggregateOutcome {
        student,
        addresses,
        contacts,
        enrollments,
        skipped_enrollments,
    })
}
