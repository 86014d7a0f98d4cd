use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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
    let exe = env!("CARGO_BIN_EXE_chamadad");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn chamadad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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

fn marks_for(remote_db: &Path, class_id: &str, date: &str) -> Vec<(String, bool, bool)> {
    let conn = Connection::open(remote_db).expect("open remote");
    let mut stmt = conn
        .prepare(
            "SELECT student_id, present, justified FROM attendance_marks
             WHERE class_id = ? AND date = ?
             ORDER BY student_id",
        )
        .expect("prepare");
    stmt.query_map((class_id, date), |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, i64>(1)? != 0,
            r.get::<_, i64>(2)? != 0,
        ))
    })
    .expect("query")
    .collect::<Result<Vec<_>, _>>()
    .expect("rows")
}

#[test]
fn offline_rollcall_reaches_the_server_when_connectivity_returns() {
    let workspace = temp_dir("chamadad-offline-online");
    let remote_db = workspace.join("server-attendance.sqlite3");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "remote.configure",
        json!({ "path": remote_db.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "connectivity.set",
        json!({ "online": false }),
    );

    // The teacher fills the screen offline; autosave keeps a draft.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "draft.save",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": { "s1": true, "s2": false }
        }),
    );
    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "rollcall.submit",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": [
                { "studentId": "s1", "present": true },
                { "studentId": "s2", "present": false, "justified": true }
            ]
        }),
    );
    assert_eq!(submitted.get("queued"), Some(&json!(true)));

    let listed = request_ok(&mut stdin, &mut reader, "6", "queue.list", json!({}));
    assert_eq!(listed.get("count"), Some(&json!(1)));

    // Submission handed the batch off, so the draft must already be gone.
    let draft = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "draft.load",
        json!({ "classId": "C1", "date": "2024-05-10" }),
    );
    assert_eq!(draft.get("draft"), Some(&json!(null)));

    // Connectivity returns and the queue drains.
    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "connectivity.set",
        json!({ "online": true }),
    );
    let sync = restored.get("sync").expect("sync outcome");
    assert_eq!(sync.get("deliveredCount"), Some(&json!(1)));
    assert_eq!(sync.get("success"), Some(&json!(true)));
    assert_eq!(sync.get("message"), Some(&json!("1 chamada sincronizada")));

    assert_eq!(
        marks_for(&remote_db, "C1", "2024-05-10"),
        vec![
            ("s1".to_string(), true, false),
            ("s2".to_string(), false, true)
        ]
    );
    let listed = request_ok(&mut stdin, &mut reader, "9", "queue.list", json!({}));
    assert_eq!(listed.get("count"), Some(&json!(0)));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn resubmission_replaces_the_committed_day_without_duplicates() {
    let workspace = temp_dir("chamadad-resubmit");
    let remote_db = workspace.join("server-attendance.sqlite3");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "remote.configure",
        json!({ "path": remote_db.to_string_lossy() }),
    );

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "rollcall.submit",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": [
                { "studentId": "s1", "present": true },
                { "studentId": "s2", "present": true }
            ]
        }),
    );
    assert_eq!(first.get("delivered"), Some(&json!(true)));

    // The teacher corrects the roll call and submits the same day again.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "rollcall.submit",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": [
                { "studentId": "s1", "present": true },
                { "studentId": "s2", "present": false, "justified": true }
            ]
        }),
    );
    assert_eq!(second.get("delivered"), Some(&json!(true)));

    // Replace-by-key: one row per student, reflecting the latest submission.
    assert_eq!(
        marks_for(&remote_db, "C1", "2024-05-10"),
        vec![
            ("s1".to_string(), true, false),
            ("s2".to_string(), false, true)
        ]
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn successful_direct_submit_clears_the_draft() {
    let workspace = temp_dir("chamadad-direct-clear");
    let remote_db = workspace.join("server-attendance.sqlite3");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "remote.configure",
        json!({ "path": remote_db.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "draft.save",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": { "s1": true }
        }),
    );
    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "rollcall.submit",
        json!({
            "classId": "C1",
            "date": "2024-05-10",
            "marks": [{ "studentId": "s1", "present": true }]
        }),
    );
    assert_eq!(submitted.get("delivered"), Some(&json!(true)));

    let draft = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "draft.load",
        json!({ "classId": "C1", "date": "2024-05-10" }),
    );
    assert_eq!(draft.get("draft"), Some(&json!(null)));

    // The draft stays gone across a restart too.
    drop(stdin);
    let _ = child.wait();
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let draft = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "draft.load",
        json!({ "classId": "C1", "date": "2024-05-10" }),
    );
    assert_eq!(draft.get("draft"), Some(&json!(null)));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
