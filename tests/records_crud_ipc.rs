use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .env_remove("ROSTERD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

fn select_workspace(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, prefix: &str) {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

fn student_body(last_name: &str) -> serde_json::Value {
    json!({
        "firstName": "Alan",
        "lastName": last_name,
        "dateOfBirth": "2006-06-23",
        "gender": 0,
        "joiningDate": "2023-09-01",
        "studentStatus": 0
    })
}

#[test]
fn update_and_patch_keep_identity() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-crud-identity");

    let created = request_ok(&mut stdin, &mut reader, "1", "students.create", student_body("Turing"));
    let s = created["studentNumber"].as_i64().expect("studentNumber");

    let mut body = student_body("Mathison");
    body["studentNumber"] = json!(s.to_string());
    let updated = request_ok(&mut stdin, &mut reader, "2", "students.update", body);
    assert_eq!(updated["studentNumber"], s);
    assert_eq!(updated["lastName"], "Mathison");

    let patched = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.patch",
        json!({ "studentNumber": s, "patch": { "studentStatus": 2 } }),
    );
    assert_eq!(patched["studentNumber"], s);
    assert_eq!(patched["lastName"], "Mathison");
    assert_eq!(patched["studentStatus"], 2);

    let fetched = request_ok(&mut stdin, &mut reader, "4", "students.get", json!({ "studentNumber": s }));
    assert_eq!(fetched, patched);
    let listed = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(listed["students"].as_array().map(|a| a.len()), Some(1));
}

#[test]
fn missing_rows_and_bad_references_are_reported() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-crud-errors");

    let mut body = student_body("Ghost");
    body["studentNumber"] = json!(77);
    let e = request_err(&mut stdin, &mut reader, "1", "students.update", body);
    assert_eq!(e["code"], "not_found");
    assert_eq!(e["message"], "Student not found");
    assert_eq!(e["details"]["detail"], "studentNumber=77");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "contacts.create",
        json!({ "studentNumber": "nope", "emailAddress": "a@b.c", "mobileNumber": "1" }),
    );
    assert_eq!(e["code"], "invalid_reference");
    assert_eq!(e["details"]["status"], 400);

    let mut bad_code = student_body("Coded");
    bad_code["gender"] = json!(3);
    let e = request_err(&mut stdin, &mut reader, "3", "students.create", bad_code);
    assert_eq!(e["code"], "bad_params");

    let e = request_err(&mut stdin, &mut reader, "4", "addresses.delete", json!({ "addressNumber": 5 }));
    assert_eq!(e["code"], "not_found");
    assert_eq!(e["details"]["detail"], "addressNumber=5");
}

#[test]
fn enrollment_csv_resolves_references_per_row() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-crud-enroll-csv");

    let s = request_ok(&mut stdin, &mut reader, "1", "students.create", student_body("Noether"))
        ["studentNumber"]
        .as_i64()
        .expect("studentNumber");
    let c = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.create",
        json!({ "courseName": "Abstract Algebra", "courseCode": "ALG2", "courseCredits": 4 }),
    )["courseNumber"]
        .as_i64()
        .expect("courseNumber");

    let csv = format!(
        "studentNumber,courseNumber,enrollmentDate,overallGrade,semester,instructorName\n\
         {s},{c},2024-09-10,91,FALL24,Prof. Artin\n\
         {s},{c},2024-09-10,91,FALL24,Prof. Artin\n\
         {s},abc,2024-09-10,91,SPR25,Prof. Artin\n\
         {s},{c},2024-09-10,ninety,SPR25,Prof. Artin\n"
    );
    let out = request_ok(&mut stdin, &mut reader, "3", "enrollments.uploadCsv", json!({ "csvText": csv }));
    assert_eq!(out["status"], 207);
    assert_eq!(out["inserted"], 1);
    let errors: Vec<String> = out["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    assert_eq!(errors.len(), 3);
    assert!(errors[0].starts_with("Row 3: "));
    assert_eq!(errors[1], "Row 4: missing or invalid foreign key coursenumber=abc");
    assert_eq!(errors[2], "Row 5: invalid integer for overallgrade: \"ninety\"");
}
