use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Integer wire code <-> tagged variant, plus the upper-case name used in CSV columns.
pub trait WireEnum: Sized + Copy + 'static {
    const TABLE: &'static [(Self, i64, &'static str)];
    /// Used when an unknown name is tolerated instead of rejected.
    const FALLBACK: Self;

    fn from_code(code: i64) -> Option<Self> {
        Self::TABLE.iter().find(|(_, c, _)| *c == code).map(|(v, _, _)| *v)
    }

    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::TABLE
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(v, _, _)| *v)
    }

    fn code(self) -> i64;

    fn name(self) -> &'static str {
        let code = self.code();
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(_, _, n)| *n)
            .unwrap_or("")
    }
}

macro_rules! wire_enum {
    ($ty:ident, fallback = $fb:ident, { $($variant:ident = $code:literal => $name:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $ty {
            $($variant),+
        }

        impl WireEnum for $ty {
            const TABLE: &'static [(Self, i64, &'static str)] = &[$((Self::$variant, $code, $name)),+];
            const FALLBACK: Self = Self::$fb;

            fn code(self) -> i64 {
                match self {
                    $(Self::$variant => $code),+
                }
            }
        }

        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_i64(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let code = i64::deserialize(d)?;
                Self::from_code(code).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "{} code out of range: {}",
                        stringify!($ty),
                        code
                    ))
                })
            }
        }
    };
}

wire_enum!(Gender, fallback = Other, {
    Male = 0 => "MALE",
    Female = 1 => "FEMALE",
    Other = 2 => "OTHER",
});

wire_enum!(StudentStatus, fallback = Active, {
    Active = 0 => "ACTIVE",
    Inactive = 1 => "INACTIVE",
    Graduated = 2 => "GRADUATED",
});

wire_enum!(AttendanceStatus, fallback = Present, {
    Present = 0 => "PRESENT",
    Absent = 1 => "ABSENT",
    Excused = 2 => "EXCUSED",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, skip_deserializing)]
    pub student_number: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub joining_date: NaiveDate,
    pub student_status: StudentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default, skip_deserializing)]
    pub course_number: Option<i64>,
    pub course_name: String,
    pub course_code: String,
    pub course_credits: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default, skip_deserializing)]
    pub enrollment_number: Option<i64>,
    pub student_number: i64,
    pub course_number: i64,
    pub enrollment_date: NaiveDate,
    pub overall_grade: i32,
    pub semester: String,
    pub instructor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_deserializing)]
    pub address_number: Option<i64>,
    pub student_number: i64,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_deserializing)]
    pub contact_number: Option<i64>,
    pub student_number: i64,
    pub email_address: String,
    pub mobile_number: String,
}

pub const DEFAULT_MAX_SCORE: i32 = 100;

fn default_max_score() -> i32 {
    DEFAULT_MAX_SCORE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    #[serde(default, skip_deserializing)]
    pub grade_number: Option<i64>,
    pub enrollment_number: i64,
    pub assessment_date: NaiveDate,
    pub assessment_type: String,
    pub obtained_score: i32,
    #[serde(default = "default_max_score")]
    pub max_score: i32,
    /// 0=A, 1=B, 2=C, 3=D, 4=F, -1=unknown
    pub grade_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[serde(default, skip_deserializing)]
    pub attendance_number: Option<i64>,
    pub enrollment_number: i64,
    pub student_number: i64,
    pub attendance_date: NaiveDate,
    pub attendance_status: AttendanceStatus,
    pub semester: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip_through_table() {
        assert_eq!(Gender::from_code(1), Some(Gender::Female));
        assert_eq!(Gender::Female.code(), 1);
        assert_eq!(StudentStatus::from_code(2), Some(StudentStatus::Graduated));
        assert_eq!(AttendanceStatus::Excused.name(), "EXCUSED");
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        assert_eq!(Gender::from_code(3), None);
        assert_eq!(StudentStatus::from_code(-1), None);
        let parsed: Result<Gender, _> = serde_json::from_value(serde_json::json!(7));
        assert!(parsed.is_err());
    }

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(Gender::from_name(" female "), Some(Gender::Female));
        assert_eq!(AttendanceStatus::from_name("absent"), Some(AttendanceStatus::Absent));
        assert_eq!(StudentStatus::from_name("alumni"), None);
    }

    #[test]
    fn student_serializes_with_wire_codes() {
        let s = Student {
            student_number: Some(4),
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2008, 12, 10).unwrap(),
            gender: Gender::Female,
            joining_date: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
            student_status: StudentStatus::Active,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["studentNumber"], 4);
        assert_eq!(v["gender"], 1);
        assert_eq!(v["studentStatus"], 0);
        assert_eq!(v["dateOfBirth"], "2008-12-10");
    }
}
