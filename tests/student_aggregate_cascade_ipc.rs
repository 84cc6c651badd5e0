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

fn create_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    code: &str,
) -> i64 {
    let out = request_ok(
        stdin,
        reader,
        id,
        "courses.create",
        json!({ "courseName": format!("Course {}", code), "courseCode": code, "courseCredits": 3.5 }),
    );
    out["courseNumber"].as_i64().expect("courseNumber")
}

fn aggregate_body(course: i64, missing_course: i64) -> serde_json::Value {
    json!({
        "firstName": "Grace",
        "lastName": "Hopper",
        "dateOfBirth": "2007-12-09",
        "gender": 1,
        "joiningDate": "2023-09-01",
        "studentStatus": 0,
        "addresses": [
            { "street": "1 Navy Way", "city": "Arlington", "state": "VA", "zipCode": "22202" }
        ],
        "contacts": [
            { "emailAddress": "grace@example.com", "mobileNumber": "5550100" }
        ],
        "enrollments": [
            { "courseNumber": course, "enrollmentDate": "2023-09-05", "overallGrade": 95,
              "semester": "FALL23", "instructorName": "Prof. Aiken" },
            { "courseNumber": missing_course, "enrollmentDate": "2023-09-05", "overallGrade": 80,
              "semester": "FALL23", "instructorName": "Prof. Nobody" }
        ]
    })
}

#[test]
fn aggregate_skips_unknown_course_and_keeps_the_rest() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-aggregate-skip");
    let course = create_course(&mut stdin, &mut reader, "1", "CS101");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.createAggregate",
        aggregate_body(course, 424242),
    );
    assert_eq!(student["firstName"], "Grace");
    let s = student["studentNumber"].as_i64().expect("studentNumber");

    let addresses = request_ok(&mut stdin, &mut reader, "3", "addresses.list", json!({ "studentNumber": s }));
    assert_eq!(addresses["addresses"].as_array().map(|a| a.len()), Some(1));
    let contacts = request_ok(&mut stdin, &mut reader, "4", "contacts.list", json!({ "studentNumber": s }));
    assert_eq!(contacts["contacts"].as_array().map(|a| a.len()), Some(1));
    let enrollments =
        request_ok(&mut stdin, &mut reader, "5", "enrollments.list", json!({ "studentNumber": s }));
    let enrollments = enrollments["enrollments"].as_array().cloned().unwrap_or_default();
    assert_eq!(enrollments.len(), 1);
    assert_eq!(enrollments[0]["courseNumber"], course);
}

#[test]
fn aggregate_reject_policy_fails_closed() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-aggregate-reject");
    let course = create_course(&mut stdin, &mut reader, "1", "CS102");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "aggregate", "patch": { "unresolvedCoursePolicy": "reject" } }),
    );

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.createAggregate",
        aggregate_body(course, 424242),
    );
    assert_eq!(e["code"], "invalid_reference");

    let mut blank = aggregate_body(course, course);
    blank["enrollments"] = json!([]);
    blank["addresses"][0]["city"] = json!(" ");
    let e = request_err(&mut stdin, &mut reader, "4", "students.createAggregate", blank);
    assert_eq!(e["code"], "bad_params");
    assert_eq!(e["message"], "addresses[0].city must not be empty");

    let students = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({}));
    assert_eq!(students["students"], json!([]));
    let addresses = request_ok(&mut stdin, &mut reader, "6", "addresses.list", json!({}));
    assert_eq!(addresses["addresses"], json!([]));
}

#[test]
fn deleting_student_removes_every_dependent() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-cascade");
    let math = create_course(&mut stdin, &mut reader, "1", "MATH101");
    let art = create_course(&mut stdin, &mut reader, "2", "ART101");

    let student = request_ok(&mut stdin, &mut reader, "3", "students.createAggregate", {
        let mut body = aggregate_body(math, art);
        body["enrollments"][1]["semester"] = json!("SPR24");
        body
    });
    let s = student["studentNumber"].as_i64().expect("studentNumber");
    let enrollments =
        request_ok(&mut stdin, &mut reader, "4", "enrollments.list", json!({ "studentNumber": s }));
    let enrollment_numbers: Vec<i64> = enrollments["enrollments"]
        .as_array()
        .expect("enrollments")
        .iter()
        .filter_map(|e| e["enrollmentNumber"].as_i64())
        .collect();
    assert_eq!(enrollment_numbers.len(), 2);

    for (i, e) in enrollment_numbers.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("g{}", i),
            "grades.create",
            json!({
                "enrollmentNumber": e, "assessmentDate": "2024-10-01", "assessmentType": "Quiz",
                "obtainedScore": 18, "maxScore": 20, "gradeCode": 0
            }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("a{}", i),
            "attendance.create",
            json!({
                "enrollmentNumber": e, "studentNumber": s,
                "attendanceDate": "2024-09-11", "attendanceStatus": 0, "semester": "FALL23"
            }),
        );
    }

    let deleted = request_ok(&mut stdin, &mut reader, "5", "students.delete", json!({ "studentNumber": s }));
    assert_eq!(deleted["deleted"]["students"], 1);
    assert_eq!(deleted["deleted"]["enrollments"], 2);
    assert_eq!(deleted["deleted"]["grades"], 2);
    assert_eq!(deleted["deleted"]["attendance"], 2);
    assert_eq!(deleted["deleted"]["contacts"], 1);
    assert_eq!(deleted["deleted"]["addresses"], 1);

    let e = request_err(&mut stdin, &mut reader, "6", "students.get", json!({ "studentNumber": s }));
    assert_eq!(e["code"], "not_found");
    assert_eq!(e["details"]["status"], 404);
    for (i, (method, key)) in [
        ("addresses.list", "addresses"),
        ("contacts.list", "contacts"),
        ("enrollments.list", "enrollments"),
        ("attendance.list", "attendance"),
    ]
    .iter()
    .enumerate()
    {
        let out = request_ok(&mut stdin, &mut reader, &format!("l{}", i), method, json!({ "studentNumber": s }));
        assert_eq!(out[*key], json!([]), "{} not empty after delete", method);
    }
    let grades = request_ok(&mut stdin, &mut reader, "7", "grades.list", json!({}));
    assert_eq!(grades["grades"], json!([]));

    // Courses are not part of a student's closure.
    let courses = request_ok(&mut stdin, &mut reader, "8", "courses.list", json!({}));
    assert_eq!(courses["courses"].as_array().map(|a| a.len()), Some(2));

    let e = request_err(&mut stdin, &mut reader, "9", "students.delete", json!({ "studentNumber": s }));
    assert_eq!(e["code"], "not_found");
}

#[test]
fn course_delete_refuses_while_enrolled_and_enrollment_delete_cascades() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "rosterd-course-in-use");
    let course = create_course(&mut stdin, &mut reader, "1", "CHEM1");
    let student = request_ok(&mut stdin, &mut reader, "2", "students.createAggregate", {
        let mut body = aggregate_body(course, course);
        body["enrollments"] = json!([body["enrollments"][0].clone()]);
        body
    });
    let s = student["studentNumber"].as_i64().expect("studentNumber");
    let enrollments =
        request_ok(&mut stdin, &mut reader, "3", "enrollments.list", json!({ "studentNumber": s }));
    let e = enrollments["enrollments"][0]["enrollmentNumber"].as_i64().expect("enrollmentNumber");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.create",
        json!({
            "enrollmentNumber": e, "assessmentDate": "2024-10-01", "assessmentType": "Lab",
            "obtainedScore": 9, "maxScore": 10, "gradeCode": 0
        }),
    );

    let err = request_err(&mut stdin, &mut reader, "5", "courses.delete", json!({ "courseNumber": course }));
    assert_eq!(err["code"], "in_use");
    assert_eq!(err["details"]["status"], 409);

    let deleted = request_ok(&mut stdin, &mut reader, "6", "enrollments.delete", json!({ "enrollmentNumber": e }));
    assert_eq!(deleted["deleted"]["grades"], 1);
    assert_eq!(deleted["deleted"]["enrollments"], 1);
    let grades = request_ok(&mut stdin, &mut reader, "7", "grades.list", json!({ "enrollmentNumber": e }));
    assert_eq!(grades["grades"], json!([]));

    let _ = request_ok(&mut stdin, &mut reader, "8", "courses.delete", json!({ "courseNumber": course }));
    let _ = request_ok(&mut stdin, &mut reader, "9", "students.get", json!({ "studentNumber": s }));
}
