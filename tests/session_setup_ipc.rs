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
    let exe = env!("CARGO_BIN_EXE_classrecordd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classrecordd");
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
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn users_see_only_their_own_records() {
    let workspace = temp_dir("classrecord-session");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let who = request_ok(&mut stdin, &mut reader, "2", "session.get", json!({}));
    assert_eq!(who["user"], serde_json::Value::Null);

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.setUser",
        json!({ "user": " teacher.ana " }),
    );
    let who = request_ok(&mut stdin, &mut reader, "4", "session.get", json!({}));
    assert_eq!(who["user"], "teacher.ana");

    let sec = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sections.create",
        json!({ "name": "Ana's Section" }),
    );
    let sec = sec["sectionId"].as_str().expect("sectionId").to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "classRecord", "patch": { "studentSort": "name" } }),
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "session.setUser",
        json!({ "user": "teacher.ben" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "8", "sections.list", json!({}));
    assert_eq!(listed["sections"], json!([]));
    let foreign = request(
        &mut stdin,
        &mut reader,
        "9",
        "students.list",
        json!({ "sectionId": sec }),
    );
    assert_eq!(error_code(&foreign), "not_found");
    let setup = request_ok(&mut stdin, &mut reader, "10", "setup.get", json!({}));
    assert_eq!(setup["classRecord"]["studentSort"], "genderThenName");

    request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "session.setUser",
        json!({ "user": null }),
    );
    let shared = request_ok(&mut stdin, &mut reader, "12", "sections.list", json!({}));
    assert_eq!(shared["sections"], json!([]));

    request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "session.setUser",
        json!({ "user": "teacher.ana" }),
    );
    let listed = request_ok(&mut stdin, &mut reader, "14", "sections.list", json!({}));
    assert_eq!(listed["sections"][0]["name"], "Ana's Section");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn setup_defaults_and_validation() {
    let workspace = temp_dir("classrecord-setup");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let setup = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        setup,
        json!({
            "notifications": { "enabled": true, "bannerSeconds": 8 },
            "classRecord": { "studentSort": "genderThenName", "attendanceView": "month" }
        })
    );

    for (id, params) in [
        ("3", json!({ "section": "notifications", "patch": { "bannerSeconds": 61 } })),
        ("4", json!({ "section": "notifications", "patch": { "enabled": "yes" } })),
        ("5", json!({ "section": "classRecord", "patch": { "studentSort": "lrn" } })),
        ("6", json!({ "section": "classRecord", "patch": { "theme": "dark" } })),
        ("7", json!({ "section": "printer", "patch": {} })),
        ("8", json!({ "section": "notifications", "patch": 5 })),
    ] {
        let resp = request(&mut stdin, &mut reader, id, "setup.update", params);
        assert_eq!(error_code(&resp), "bad_params", "request {}", id);
    }

    request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "setup.update",
        json!({ "section": "classRecord", "patch": { "attendanceView": "allTime" } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "setup.update",
        json!({ "section": "notifications", "patch": { "bannerSeconds": 15 } }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "11", "setup.get", json!({}));
    assert_eq!(setup["classRecord"]["attendanceView"], "allTime");
    assert_eq!(setup["classRecord"]["studentSort"], "genderThenName");
    assert_eq!(setup["notifications"]["bannerSeconds"], 15);
    assert_eq!(setup["notifications"]["enabled"], true);

    drop(stdin);
    let _ = child.wait();

    // Settings persist with the workspace.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(setup["notifications"]["bannerSeconds"], 15);
    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
