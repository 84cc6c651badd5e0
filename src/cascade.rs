//! Dependency-ordered deletion. The schema has no ON DELETE CASCADE, so every
//! dependent row is removed here before the row it points at.

use crate::model::{Address, Attendance, Contact, Enrollment, Grade, Student};
use crate::store::{self, ForeignKey};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

/// Rows removed per table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub grades: usize,
    pub attendance: usize,
    pub enrollments: usize,
    pub contacts: usize,
    pub addresses: usize,
    pub students: usize,
}

/// Grades and attendance of one enrollment, then the enrollment.
fn remove_enrollment(
    conn: &Connection,
    enrollment_number: i64,
    report: &mut CascadeReport,
) -> rusqlite::Result<()> {
    report.grades +=
        store::delete_by_foreign_key::<Grade>(conn, ForeignKey::Enrollment, enrollment_number)?;
    report.attendance +=
        store::delete_by_foreign_key::<Attendance>(conn, ForeignKey::Enrollment, enrollment_number)?;
    if store::delete_by_id::<Enrollment>(conn, enrollment_number)? {
        report.enrollments += 1;
    }
    Ok(())
}

/// Removes a student and everything that references it, in one transaction:
/// enrollments (with their grades and attendance), remaining attendance
/// naming the student, contacts, addresses, then the student.
pub fn delete_student(conn: &Connection, student_number: i64) -> Result<CascadeReport, CascadeError> {
    let tx = conn.unchecked_transaction()?;
    if store::find_by_id::<Student>(&tx, student_number)?.is_none() {
        return Err(CascadeError::NotFound {
            entity: "student",
            id: student_number,
        });
    }

    let mut report = CascadeReport::default();
    let enrollments: Vec<Enrollment> =
        store::find_by_foreign_key(&tx, ForeignKey::Student, student_number)?;
    for enrollment in &enrollments {
        if let Some(id) = enrollment.enrollment_number {
            remove_enrollment(&tx, id, &mut report)?;
        }
    }
    report.attendance +=
        store::delete_by_foreign_key::<Attendance>(&tx, ForeignKey::Student, student_number)?;
    report.contacts +=
        store::delete_by_foreign_key::<Contact>(&tx, ForeignKey::Student, student_number)?;
    report.addresses +=
        store::delete_by_foreign_key::<Address>(&tx, ForeignKey::Student, student_number)?;
    if store::delete_by_id::<Student>(&tx, student_number)? {
        report.students += 1;
    }
    tx.commit()?;

    tracing::info!(student_number, ?report, "student deleted with dependents");
    Ok(report)
}

pub fn delete_enrollment(
    conn: &Connection,
    enrollment_number: i64,
) -> Result<CascadeReport, CascadeError> {
    let tx = conn.unchecked_transaction()?;
    if store::find_by_id::<Enrollment>(&tx, enrollment_number)?.is_none() {
        return Err(CascadeError::NotFound {
            entity: "enrollment",
            id: enrollment_number,
        });
    }
    let mut report = CascadeReport::default();
    remove_enrollment(&tx, enrollment_number, &mut report)?;
    tx.commit()?;
    tracing::info!(enrollment_number, ?report, "enrollment deleted with dependents");
    Ok(report)
}
