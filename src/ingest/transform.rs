use super::error::RowError;
use super::resolve::resolve;
use super::rows::{HeaderIndex, RawRow};
use crate::model::{
    Address, Attendance, AttendanceStatus, Contact, Course, Enrollment, Gender, Grade, Student,
    StudentStatus, WireEnum, DEFAULT_MAX_SCORE,
};
use crate::store::{self, Record};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::str::FromStr;

/// What to do with an enum name that is not in the wire table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPolicy {
    /// Substitute the type's fallback variant.
    Fallback,
    Reject,
}

impl EnumPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fallback" => Some(EnumPolicy::Fallback),
            "reject" => Some(EnumPolicy::Reject),
            _ => None,
        }
    }
}

pub struct RowContext<'a> {
    pub conn: &'a Connection,
    pub header: &'a HeaderIndex,
    pub enum_policy: EnumPolicy,
}

impl<'a> RowContext<'a> {
    fn raw<'r>(&self, row: &'r RawRow, column: &'static str) -> &'r str {
        row.field(self.header, column)
    }

    fn text(&self, row: &RawRow, column: &'static str) -> Result<String, RowError> {
        let v = self.raw(row, column);
        if v.is_empty() {
            return Err(RowError::Empty { column });
        }
        Ok(v.to_string())
    }

    fn date(&self, row: &RawRow, column: &'static str) -> Result<NaiveDate, RowError> {
        parse_date(self.raw(row, column), column)
    }

    fn number<T: FromStr>(
        &self,
        row: &RawRow,
        column: &'static str,
        kind: &'static str,
    ) -> Result<T, RowError> {
        let v = self.raw(row, column);
        v.parse().map_err(|_| RowError::Conversion {
            column,
            kind,
            value: v.to_string(),
        })
    }

    /// Like `number`, but `inf` and `NaN` are not decimals.
    fn decimal(&self, row: &RawRow, column: &'static str) -> Result<f64, RowError> {
        let v: f64 = self.number(row, column, "decimal")?;
        if !v.is_finite() {
            return Err(RowError::Conversion {
                column,
                kind: "decimal",
                value: self.raw(row, column).to_string(),
            });
        }
        Ok(v)
    }

    fn enum_name<E: WireEnum>(&self, row: &RawRow, column: &'static str) -> Result<E, RowError> {
        parse_enum_name(self.raw(row, column), column, self.enum_policy)
    }

    fn reference<R: Record>(&self, row: &RawRow, column: &'static str) -> Result<R, RowError> {
        let conn = self.conn;
        Ok(resolve(self.raw(row, column), column, |id| {
            store::find_by_id::<R>(conn, id)
        })?)
    }
}

/// Zero-padded `YYYY-MM-DD` only.
pub fn parse_date(value: &str, column: &'static str) -> Result<NaiveDate, RowError> {
    let invalid = || RowError::Conversion {
        column,
        kind: "date",
        value: value.to_string(),
    };
    let b = value.as_bytes();
    let shaped = b.len() == 10
        && b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            _ => c.is_ascii_digit(),
        });
    if !shaped {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())
}

pub fn parse_enum_name<E: WireEnum>(
    value: &str,
    column: &'static str,
    policy: EnumPolicy,
) -> Result<E, RowError> {
    match (E::from_name(value), policy) {
        (Some(v), _) => Ok(v),
        (None, EnumPolicy::Fallback) => Ok(E::FALLBACK),
        (None, EnumPolicy::Reject) => Err(RowError::Conversion {
            column,
            kind: "code",
            value: value.to_string(),
        }),
    }
}

/// A resource that can be built from one CSV row.
pub trait RowImport: Record + Serialize {
    /// Key of the created-records list in the upload response.
    const RESOURCE: &'static str;
    const REQUIRED_COLUMNS: &'static [&'static str];

    /// References are resolved before any other field is converted.
    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError>;
}

impl RowImport for Student {
    const RESOURCE: &'static str = "students";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "firstname",
        "lastname",
        "dateofbirth",
        "gender",
        "joiningdate",
        "studentstatus",
    ];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        Ok(Student {
            student_number: None,
            first_name: ctx.text(row, "firstname")?,
            last_name: ctx.text(row, "lastname")?,
            date_of_birth: ctx.date(row, "dateofbirth")?,
            gender: ctx.enum_name::<Gender>(row, "gender")?,
            joining_date: ctx.date(row, "joiningdate")?,
            student_status: ctx.enum_name::<StudentStatus>(row, "studentstatus")?,
        })
    }
}

impl RowImport for Course {
    const RESOURCE: &'static str = "courses";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["coursename", "coursecode", "coursecredits"];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        Ok(Course {
            course_number: None,
            course_name: ctx.text(row, "coursename")?,
            course_code: ctx.text(row, "coursecode")?,
            course_credits: ctx.decimal(row, "coursecredits")?,
        })
    }
}

impl RowImport for Enrollment {
    const RESOURCE: &'static str = "enrollments";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "studentnumber",
        "coursenumber",
        "enrollmentdate",
        "overallgrade",
        "semester",
        "instructorname",
    ];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        let student: Student = ctx.reference(row, "studentnumber")?;
        let course: Course = ctx.reference(row, "coursenumber")?;
        Ok(Enrollment {
            enrollment_number: None,
            student_number: student.id().unwrap_or_default(),
            course_number: course.id().unwrap_or_default(),
            enrollment_date: ctx.date(row, "enrollmentdate")?,
            overall_grade: ctx.number(row, "overallgrade", "integer")?,
            semester: ctx.text(row, "semester")?,
            instructor_name: ctx.text(row, "instructorname")?,
        })
    }
}

impl RowImport for Address {
    const RESOURCE: &'static str = "addresses";
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["studentnumber", "street", "city", "state", "zipcode"];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        let student: Student = ctx.reference(row, "studentnumber")?;
        Ok(Address {
            address_number: None,
            student_number: student.id().unwrap_or_default(),
            street: ctx.text(row, "street")?,
            city: ctx.text(row, "city")?,
            state: ctx.text(row, "state")?,
            zip_code: ctx.text(row, "zipcode")?,
        })
    }
}

impl RowImport for Contact {
    const RESOURCE: &'static str = "contacts";
    const REQUIRED_COLUMNS: &'static [&'static str] = &["studentnumber", "emailaddress", "mobilenumber"];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        let student: Student = ctx.reference(row, "studentnumber")?;
        Ok(Contact {
            contact_number: None,
            student_number: student.id().unwrap_or_default(),
            email_address: ctx.text(row, "emailaddress")?,
            mobile_number: ctx.text(row, "mobilenumber")?,
        })
    }
}

impl RowImport for Grade {
    const RESOURCE: &'static str = "grades";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "enrollmentnumber",
        "assessmentdate",
        "assessmenttype",
        "obtainedscore",
        "maxscore",
        "gradecode",
    ];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        let enrollment: Enrollment = ctx.reference(row, "enrollmentnumber")?;
        Ok(Grade {
            grade_number: None,
            enrollment_number: enrollment.id().unwrap_or_default(),
            assessment_date: ctx.date(row, "assessmentdate")?,
            assessment_type: ctx.text(row, "assessmenttype")?,
            obtained_score: ctx.number(row, "obtainedscore", "integer")?,
            max_score: match ctx.raw(row, "maxscore") {
                "" => DEFAULT_MAX_SCORE,
                _ => ctx.number(row, "maxscore", "integer")?,
            },
            grade_code: ctx.number(row, "gradecode", "integer")?,
        })
    }
}

impl RowImport for Attendance {
    const RESOURCE: &'static str = "attendance";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "studentnumber",
        "enrollmentnumber",
        "attendancedate",
        "attendancestatus",
        "semester",
    ];

    fn build(ctx: &RowContext<'_>, row: &RawRow) -> Result<Self, RowError> {
        let student: Student = ctx.reference(row, "studentnumber")?;
        let enrollment: Enrollment = ctx.reference(row, "enrollmentnumber")?;
        let status = ctx.raw(row, "attendancestatus");
        // Attendance codes are never defaulted.
        let attendance_status = parse_enum_name::<AttendanceStatus>(
            status,
            "attendancestatus",
            EnumPolicy::Reject,
        )?;
        let semester = ctx.raw(row, "semester");
        Ok(Attendance {
            attendance_number: None,
            enrollment_number: enrollment.id().unwrap_or_default(),
            student_number: student.id().unwrap_or_default(),
            attendance_date: ctx.date(row, "attendancedate")?,
            attendance_status,
            semester: (!semester.is_empty()).then(|| semester.to_string()),
        })
    }
}
