//! Repository layer: one `Record` impl per table, and the handful of generic
//! operations every caller goes through (`save`, `find_by_id`, `find_all`,
//! `delete_by_id`, `find_by_foreign_key`).

use crate::model::{
    Address, Attendance, Contact, Course, Enrollment, Grade, Student, WireEnum,
};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKey {
    Student,
    Course,
    Enrollment,
}

impl ForeignKey {
    pub fn column(self) -> &'static str {
        match self {
            ForeignKey::Student => "student_number",
            ForeignKey::Course => "course_number",
            ForeignKey::Enrollment => "enrollment_number",
        }
    }
}

pub trait Record: Sized {
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    /// Non-identity columns, in the order `values()` yields them.
    const COLUMNS: &'static [&'static str];
    const FOREIGN_KEYS: &'static [ForeignKey];
    /// Display name used in "<Entity> not found" messages.
    const ENTITY: &'static str;
    /// Wire name of the identity field.
    const ID_FIELD: &'static str;

    fn id(&self) -> Option<i64>;
    fn set_id(&mut self, id: i64);
    fn values(&self) -> Vec<Value>;
    /// Reads a row selected as `ID_COLUMN, COLUMNS...`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn select_sql<R: Record>() -> String {
    format!(
        "SELECT {}, {} FROM {}",
        R::ID_COLUMN,
        R::COLUMNS.join(", "),
        R::TABLE
    )
}

/// Inserts when the record has no identity yet, otherwise overwrites the row
/// with that identity. Returns the stored record with its identity set.
pub fn save<R: Record>(conn: &Connection, mut record: R) -> rusqlite::Result<R> {
    let values = record.values();
    match record.id() {
        None => {
            let placeholders = vec!["?"; R::COLUMNS.len()].join(", ");
            let sql = format!(
                "INSERT INTO {}({}) VALUES({})",
                R::TABLE,
                R::COLUMNS.join(", "),
                placeholders
            );
            conn.execute(&sql, params_from_iter(values))?;
            record.set_id(conn.last_insert_rowid());
            Ok(record)
        }
        Some(id) => {
            let assignments = R::COLUMNS
                .iter()
                .map(|c| format!("{} = ?", c))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                R::TABLE,
                assignments,
                R::ID_COLUMN
            );
            let mut params = values;
            params.push(Value::Integer(id));
            let changed = conn.execute(&sql, params_from_iter(params))?;
            if changed == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            Ok(record)
        }
    }
}

pub fn find_by_id<R: Record>(conn: &Connection, id: i64) -> rusqlite::Result<Option<R>> {
    let sql = format!("{} WHERE {} = ?", select_sql::<R>(), R::ID_COLUMN);
    conn.query_row(&sql, [id], |r| R::from_row(r)).optional()
}

pub fn find_all<R: Record>(conn: &Connection) -> rusqlite::Result<Vec<R>> {
    let sql = format!("{} ORDER BY {}", select_sql::<R>(), R::ID_COLUMN);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |r| R::from_row(r))?;
    rows.collect()
}

pub fn find_by_foreign_key<R: Record>(
    conn: &Connection,
    fk: ForeignKey,
    id: i64,
) -> rusqlite::Result<Vec<R>> {
    if !R::FOREIGN_KEYS.contains(&fk) {
        return Ok(Vec::new());
    }
    let sql = format!(
        "{} WHERE {} = ? ORDER BY {}",
        select_sql::<R>(),
        fk.column(),
        R::ID_COLUMN
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([id], |r| R::from_row(r))?;
    rows.collect()
}

pub fn count_by_foreign_key<R: Record>(
    conn: &Connection,
    fk: ForeignKey,
    id: i64,
) -> rusqlite::Result<i64> {
    if !R::FOREIGN_KEYS.contains(&fk) {
        return Ok(0);
    }
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", R::TABLE, fk.column());
    conn.query_row(&sql, [id], |r| r.get(0))
}

pub fn delete_by_id<R: Record>(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE {} = ?", R::TABLE, R::ID_COLUMN);
    Ok(conn.execute(&sql, [id])? > 0)
}

pub fn delete_by_foreign_key<R: Record>(
    conn: &Connection,
    fk: ForeignKey,
    id: i64,
) -> rusqlite::Result<usize> {
    if !R::FOREIGN_KEYS.contains(&fk) {
        return Ok(0);
    }
    let sql = format!("DELETE FROM {} WHERE {} = ?", R::TABLE, fk.column());
    conn.execute(&sql, [id])
}

#[derive(Debug, thiserror::Error)]
#[error("unknown code {0}")]
struct UnknownCode(i64);

fn enum_col<E: WireEnum>(row: &Row<'_>, idx: usize) -> rusqlite::Result<E> {
    let code: i64 = row.get(idx)?;
    E::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(UnknownCode(code)))
    })
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn date(d: &chrono::NaiveDate) -> Value {
    Value::Text(d.format("%Y-%m-%d").to_string())
}

impl Record for Student {
    const TABLE: &'static str = "students";
    const ID_COLUMN: &'static str = "student_number";
    const COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "date_of_birth",
        "gender",
        "joining_date",
        "student_status",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[];
    const ENTITY: &'static str = "Student";
    const ID_FIELD: &'static str = "studentNumber";

    fn id(&self) -> Option<i64> {
        self.student_number
    }
    fn set_id(&mut self, id: i64) {
        self.student_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.first_name),
            text(&self.last_name),
            date(&self.date_of_birth),
            Value::Integer(self.gender.code()),
            date(&self.joining_date),
            Value::Integer(self.student_status.code()),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            student_number: Some(r.get(0)?),
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            date_of_birth: r.get(3)?,
            gender: enum_col(r, 4)?,
            joining_date: r.get(5)?,
            student_status: enum_col(r, 6)?,
        })
    }
}

impl Record for Course {
    const TABLE: &'static str = "courses";
    const ID_COLUMN: &'static str = "course_number";
    const COLUMNS: &'static [&'static str] = &["course_name", "course_code", "course_credits"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[];
    const ENTITY: &'static str = "Course";
    const ID_FIELD: &'static str = "courseNumber";

    fn id(&self) -> Option<i64> {
        self.course_number
    }
    fn set_id(&mut self, id: i64) {
        self.course_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            text(&self.course_name),
            text(&self.course_code),
            Value::Real(self.course_credits),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Course {
            course_number: Some(r.get(0)?),
            course_name: r.get(1)?,
            course_code: r.get(2)?,
            course_credits: r.get(3)?,
        })
    }
}

impl Record for Enrollment {
    const TABLE: &'static str = "enrollments";
    const ID_COLUMN: &'static str = "enrollment_number";
    const COLUMNS: &'static [&'static str] = &[
        "student_number",
        "course_number",
        "enrollment_date",
        "overall_grade",
        "semester",
        "instructor_name",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::Student, ForeignKey::Course];
    const ENTITY: &'static str = "Enrollment";
    const ID_FIELD: &'static str = "enrollmentNumber";

    fn id(&self) -> Option<i64> {
        self.enrollment_number
    }
    fn set_id(&mut self, id: i64) {
        self.enrollment_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.student_number),
            Value::Integer(self.course_number),
            date(&self.enrollment_date),
            Value::Integer(self.overall_grade.into()),
            text(&self.semester),
            text(&self.instructor_name),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Enrollment {
            enrollment_number: Some(r.get(0)?),
            student_number: r.get(1)?,
            course_number: r.get(2)?,
            enrollment_date: r.get(3)?,
            overall_grade: r.get(4)?,
            semester: r.get(5)?,
            instructor_name: r.get(6)?,
        })
    }
}

impl Record for Address {
    const TABLE: &'static str = "addresses";
    const ID_COLUMN: &'static str = "address_number";
    const COLUMNS: &'static [&'static str] = &["student_number", "street", "city", "state", "zip_code"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::Student];
    const ENTITY: &'static str = "Address";
    const ID_FIELD: &'static str = "addressNumber";

    fn id(&self) -> Option<i64> {
        self.address_number
    }
    fn set_id(&mut self, id: i64) {
        self.address_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.student_number),
            text(&self.street),
            text(&self.city),
            text(&self.state),
            text(&self.zip_code),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Address {
            address_number: Some(r.get(0)?),
            student_number: r.get(1)?,
            street: r.get(2)?,
            city: r.get(3)?,
            state: r.get(4)?,
            zip_code: r.get(5)?,
        })
    }
}

impl Record for Contact {
    const TABLE: &'static str = "contacts";
    const ID_COLUMN: &'static str = "contact_number";
    const COLUMNS: &'static [&'static str] = &["student_number", "email_address", "mobile_number"];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::Student];
    const ENTITY: &'static str = "Contact";
    const ID_FIELD: &'static str = "contactNumber";

    fn id(&self) -> Option<i64> {
        self.contact_number
    }
    fn set_id(&mut self, id: i64) {
        self.contact_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.student_number),
            text(&self.email_address),
            text(&self.mobile_number),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Contact {
            contact_number: Some(r.get(0)?),
            student_number: r.get(1)?,
            email_address: r.get(2)?,
            mobile_number: r.get(3)?,
        })
    }
}

impl Record for Grade {
    const TABLE: &'static str = "grades";
    const ID_COLUMN: &'static str = "grade_number";
    const COLUMNS: &'static [&'static str] = &[
        "enrollment_number",
        "assessment_date",
        "assessment_type",
        "obtained_score",
        "max_score",
        "grade_code",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::Enrollment];
    const ENTITY: &'static str = "Grade";
    const ID_FIELD: &'static str = "gradeNumber";

    fn id(&self) -> Option<i64> {
        self.grade_number
    }
    fn set_id(&mut self, id: i64) {
        self.grade_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.enrollment_number),
            date(&self.assessment_date),
            text(&self.assessment_type),
            Value::Integer(self.obtained_score.into()),
            Value::Integer(self.max_score.into()),
            Value::Integer(self.grade_code.into()),
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Grade {
            grade_number: Some(r.get(0)?),
            enrollment_number: r.get(1)?,
            assessment_date: r.get(2)?,
            assessment_type: r.get(3)?,
            obtained_score: r.get(4)?,
            max_score: r.get(5)?,
            grade_code: r.get(6)?,
        })
    }
}

impl Record for Attendance {
    const TABLE: &'static str = "attendance";
    const ID_COLUMN: &'static str = "attendance_number";
    const COLUMNS: &'static [&'static str] = &[
        "enrollment_number",
        "student_number",
        "attendance_date",
        "attendance_status",
        "semester",
    ];
    const FOREIGN_KEYS: &'static [ForeignKey] = &[ForeignKey::Enrollment, ForeignKey::Student];
    const ENTITY: &'static str = "Attendance";
    const ID_FIELD: &'static str = "attendanceNumber";

    fn id(&self) -> Option<i64> {
        self.attendance_number
    }
    fn set_id(&mut self, id: i64) {
        self.attendance_number = Some(id);
    }
    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.enrollment_number),
            Value::Integer(self.student_number),
            date(&self.attendance_date),
            Value::Integer(self.attendance_status.code()),
            match &self.semester {
                Some(s) => text(s),
                None => Value::Null,
            },
        ]
    }
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Attendance {
            attendance_number: Some(r.get(0)?),
            enrollment_number: r.get(1)?,
            student_number: r.get(2)?,
            attendance_date: r.get(3)?,
            attendance_status: enum_col(r, 4)?,
            semester: r.get(5)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::model::{Gender, StudentStatus};
    use chrono::NaiveDate;

    pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub fn student(conn: &Connection, first: &str) -> Student {
        save(
            conn,
            Student {
                student_number: None,
                first_name: first.into(),
                last_name: "Smith".into(),
                date_of_birth: day(2001, 2, 3),
                gender: Gender::Male,
                joining_date: day(2024, 9, 1),
                student_status: StudentStatus::Active,
            },
        )
        .expect("save student")
    }

    pub fn course(conn: &Connection, code: &str) -> Course {
        save(
            conn,
            Course {
                course_number: None,
                course_name: format!("Course {}", code),
                course_code: code.into(),
                course_credits: 3.0,
            },
        )
        .expect("save course")
    }

    pub fn enrollment(conn: &Connection, student: i64, course: i64, semester: &str) -> Enrollment {
        save(
            conn,
            Enrollment {
                enrollment_number: None,
                student_number: student,
                course_number: course,
                enrollment_date: day(2024, 9, 10),
                overall_grade: 90,
                semester: semester.into(),
                instructor_name: "Prof. Euler".into(),
            },
        )
        .expect("save enrollment")
    }
}
