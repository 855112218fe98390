use focus_guardian_protocol::{Method, Request, Response};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path) -> DaemonGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_focus-guardian-daemon"))
        .env("HOME", home)
        .env_remove("FOCUS_GUARDIAN_HOME")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn focus-guardian-daemon");
    DaemonGuard { child }
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".focus-guardian").join("guardian.sock")
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if UnixStream::connect(path).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for guardian socket at {}", path.display());
}

fn send_raw(socket: &Path, bytes: &[u8]) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to guardian socket");
    stream.write_all(bytes).expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn send(socket: &Path, method: Method, params: Option<Value>) -> Response {
    let request = Request::new(method, Some(format!("{:?}", method)), params);
    let mut bytes = serde_json::to_vec(&request).expect("Failed to serialize request");
    bytes.push(b'\n');
    send_raw(socket, &bytes)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

static NULL: Value = Value::Null;

/// `"data": null` deserializes to `None`, so absent data reads as JSON null.
fn data(response: &Response) -> &Value {
    assert!(response.ok, "response was not ok: {:?}", response.error);
    response.data.as_ref().unwrap_or(&NULL)
}

#[test]
fn daemon_ipc_session_and_overlay_smoke() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());
    let _daemon = spawn_daemon(home.path());
    wait_for_socket(&socket, Duration::from_secs(2));

    let health = send(&socket, Method::GetHealth, None);
    assert_eq!(data(&health)["status"], "ok");
    assert_eq!(data(&health)["active"], false);

    let started = send(
        &socket,
        Method::FlowSessionStart,
        Some(json!({ "taskId": "task-1", "allowedSites": ["github.com"] })),
    );
    assert_eq!(data(&started)["success"], true);

    let status = send(&socket, Method::GetSessionStatus, None);
    let status = data(&status);
    assert_eq!(status["isActive"], true);
    assert_eq!(status["session"]["taskId"], "task-1");
    assert_eq!(status["session"]["allowedSites"], json!(["github.com"]));
    assert!(status["session"]["startTime"].is_i64());

    let allowed = send(
        &socket,
        Method::TabUpdated,
        Some(json!({ "tabId": 3, "url": "https://docs.github.com/en" })),
    );
    assert_eq!(data(&allowed)["verdict"], "allowed");

    let blocked = send(
        &socket,
        Method::TabActivated,
        Some(json!({ "tabId": 3, "url": "https://twitter.com/home" })),
    );
    assert_eq!(data(&blocked)["verdict"], "blocked");
    assert_eq!(data(&blocked)["hostname"], "twitter.com");

    let overlay = send(&socket, Method::TakeOverlay, Some(json!({ "tabId": 3 })));
    assert_eq!(data(&overlay)["hostname"], "twitter.com");
    assert_eq!(data(&overlay)["taskId"], "task-1");

    let drained = send(&socket, Method::TakeOverlay, Some(json!({ "tabId": 3 })));
    assert!(data(&drained).is_null());

    let status = send(&socket, Method::GetSessionStatus, None);
    let distractions = &data(&status)["session"]["distractions"];
    assert_eq!(distractions.as_array().map(Vec::len), Some(1));
    assert_eq!(distractions[0]["site"], "twitter.com");
    assert!(home.path().join(".focus-guardian").join("badge.json").exists());

    let ended = send(&socket, Method::FlowSessionEnd, Some(json!({ "sessionId": "abc" })));
    assert_eq!(data(&ended)["success"], true);

    let status = send(&socket, Method::GetSessionStatus, None);
    assert_eq!(data(&status)["isActive"], false);
    assert!(data(&status)["session"].is_null());
    assert!(!home.path().join(".focus-guardian").join("session.json").exists());
}

#[test]
fn daemon_rejects_bad_requests() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());
    let _daemon = spawn_daemon(home.path());
    wait_for_socket(&socket, Duration::from_secs(2));

    let unknown = send_raw(
        &socket,
        br#"{"protocol_version":1,"method":"SELF_DESTRUCT","id":"x"}
"#,
    );
    assert!(!unknown.ok);
    assert_eq!(unknown.error.expect("error").code, "unknown_message_type");

    let garbage = send_raw(&socket, b"not json\n");
    assert_eq!(garbage.error.expect("error").code, "invalid_json");

    let blank = send_raw(&socket, b"   \n");
    assert_eq!(blank.error.expect("error").code, "empty_request");

    let mismatch = send_raw(&socket, br#"{"protocol_version":99,"method":"GET_HEALTH"}
"#);
    assert_eq!(mismatch.error.expect("error").code, "protocol_mismatch");

    let missing_task = send(&socket, Method::FlowSessionStart, Some(json!({ "allowedSites": [] })));
    assert!(!missing_task.ok);
    assert_eq!(missing_task.error.expect("error").code, "invalid_params");

    let status = send(&socket, Method::GetSessionStatus, None);
    assert_eq!(data(&status)["isActive"], false);
}

#[test]
fn idle_daemon_ignores_tab_events() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());
    let _daemon = spawn_daemon(home.path());
    wait_for_socket(&socket, Duration::from_secs(2));

    let verdict = send(
        &socket,
        Method::TabUpdated,
        Some(json!({ "tabId": 1, "url": "https://twitter.com/" })),
    );
    assert_eq!(data(&verdict)["verdict"], "inactive");

    let overlay = send(&socket, Method::TakeOverlay, Some(json!({ "tabId": 1 })));
    assert!(data(&overlay).is_null());
}

#[test]
fn session_survives_daemon_restart() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());

    {
        let _daemon = spawn_daemon(home.path());
        wait_for_socket(&socket, Duration::from_secs(2));
        let started = send(
            &socket,
            Method::FlowSessionStart,
            Some(json!({ "taskId": "task-9", "allowedSites": ["react.dev"] })),
        );
        assert!(started.ok);
        send(
            &socket,
            Method::TabUpdated,
            Some(json!({ "tabId": 5, "url": "https://news.ycombinator.com/" })),
        );
    }

    let _daemon = spawn_daemon(home.path());
    wait_for_socket(&socket, Duration::from_secs(2));

    let health = send(&socket, Method::GetHealth, None);
    assert_eq!(data(&health)["active"], true);

    let status = send(&socket, Method::GetSessionStatus, None);
    let session = &data(&status)["session"];
    assert_eq!(session["taskId"], "task-9");
    assert_eq!(session["distractions"][0]["site"], "news.ycombinator.com");
}

#[test]
fn large_start_is_acknowledged() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = socket_path(home.path());
    let _daemon = spawn_daemon(home.path());
    wait_for_socket(&socket, Duration::from_secs(2));

    let sites: Vec<String> = (0..600).map(|i| format!("site-{}.dev", i)).collect();
    let start = send(
        &socket,
        Method::FlowSessionStart,
        Some(json!({ "taskId": "", "allowedSites": sites })),
    );
    assert!(start.ok, "start failed: {:?}", start.error);

    let status = send(&socket, Method::GetSessionStatus, None);
    let session = &data(&status)["session"];
    assert_eq!(data(&status)["isActive"], true);
    assert_eq!(session["taskId"], "");
    assert_eq!(session["allowedSites"].as_array().map(Vec::len), Some(600));
}
