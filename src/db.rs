use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rosterd.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates every table the daemon uses. Foreign keys are enforced but never
/// cascade; dependents are removed explicitly in dependency order.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_number INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            gender INTEGER NOT NULL,
            joining_date TEXT NOT NULL,
            student_status INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_last_name ON students(last_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            course_number INTEGER PRIMARY KEY AUTOINCREMENT,
            course_name TEXT NOT NULL UNIQUE,
            course_code TEXT NOT NULL UNIQUE,
            course_credits REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            enrollment_number INTEGER PRIMARY KEY AUTOINCREMENT,
            student_number INTEGER NOT NULL,
            course_number INTEGER NOT NULL,
            enrollment_date TEXT NOT NULL,
            overall_grade INTEGER NOT NULL,
            semester TEXT NOT NULL,
            instructor_name TEXT NOT NULL,
            FOREIGN KEY(student_number) REFERENCES students(student_number),
            FOREIGN KEY(course_number) REFERENCES courses(course_number),
            UNIQUE(student_number, course_number, semester)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS addresses(
            address_number INTEGER PRIMARY KEY AUTOINCREMENT,
            student_number INTEGER NOT NULL,
            street TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zip_code TEXT NOT NULL,
            FOREIGN KEY(student_number) REFERENCES students(student_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_addresses_student ON addresses(student_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS contacts(
            contact_number INTEGER PRIMARY KEY AUTOINCREMENT,
            student_number INTEGER NOT NULL,
            email_address TEXT NOT NULL UNIQUE,
            mobile_number TEXT NOT NULL UNIQUE,
            FOREIGN KEY(student_number) REFERENCES students(student_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contacts_student ON contacts(student_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            grade_number INTEGER PRIMARY KEY AUTOINCREMENT,
            enrollment_number INTEGER NOT NULL,
            assessment_date TEXT NOT NULL,
            assessment_type TEXT NOT NULL,
            obtained_score INTEGER NOT NULL,
            max_score INTEGER NOT NULL DEFAULT 100,
            grade_code INTEGER NOT NULL,
            FOREIGN KEY(enrollment_number) REFERENCES enrollments(enrollment_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_enrollment ON grades(enrollment_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            attendance_number INTEGER PRIMARY KEY AUTOINCREMENT,
            enrollment_number INTEGER NOT NULL,
            student_number INTEGER NOT NULL,
            attendance_date TEXT NOT NULL,
            attendance_status INTEGER NOT NULL DEFAULT 0,
            semester TEXT,
            FOREIGN KEY(enrollment_number) REFERENCES enrollments(enrollment_number),
            FOREIGN KEY(student_number) REFERENCES students(student_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_enrollment ON attendance(enrollment_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_number)",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}
