//! Client helper for talking to the focus guardian daemon.
//!
//! One request per connection, newline-delimited JSON. Transport failures are
//! retried once with the same request id; a response with `ok: false` is the
//! daemon's answer and is never retried.

use chrono::Utc;
use focus_guardian_protocol::{
    EndSessionPayload, ErrorInfo, Method, OverlayCommand, Request, Response, SessionStatus,
    StartSessionPayload, TabRef, MAX_REQUEST_BYTES,
};
use guardian_core::{RelayError, SessionRelay, StorageConfig};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const SOCKET_ENV: &str = "FOCUS_GUARDIAN_SOCKET";
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Daemon unavailable: {0}")]
    Unavailable(String),

    #[error("Daemon rejected request: {0}")]
    Rejected(ErrorInfo),

    #[error("Unexpected daemon response: {0}")]
    InvalidResponse(String),
}

impl From<ClientError> for RelayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(info) => RelayError::Rejected(info.to_string()),
            other => RelayError::Unavailable(other.to_string()),
        }
    }
}

/// [`SessionRelay`] that forwards page intents to the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct DaemonRelay;

impl SessionRelay for DaemonRelay {
    fn start_session(&mut self, payload: StartSessionPayload) -> Result<(), RelayError> {
        let params = to_params(&payload)?;
        call(Method::FlowSessionStart, Some(params))?;
        Ok(())
    }

    fn end_session(&mut self, payload: EndSessionPayload) -> Result<(), RelayError> {
        let params = to_params(&payload)?;
        call(Method::FlowSessionEnd, Some(params))?;
        Ok(())
    }
}

pub fn session_status() -> Result<SessionStatus, ClientError> {
    let data = call(Method::GetSessionStatus, None)?;
    decode(data, "session status")
}

/// Drains the tab's pending overlay. `None` when nothing is queued or the
/// queued command went stale.
pub fn take_overlay(tab_id: u32) -> Result<Option<OverlayCommand>, ClientError> {
    let params = to_params(&TabRef { tab_id })?;
    let data = call(Method::TakeOverlay, Some(params))?;
    decode(data, "overlay command")
}

/// `None` when the daemon cannot be reached at all.
pub fn daemon_health() -> Option<bool> {
    let data = call(Method::GetHealth, None).ok()?;
    let status = data.get("status").and_then(|value| value.as_str());
    Some(matches!(status, Some("ok")))
}

fn call(method: Method, params: Option<Value>) -> Result<Value, ClientError> {
    let request = Request::new(method, Some(make_request_id()), params);
    let response = send_with_retry(&request)?;
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        let info = response.error.unwrap_or_else(|| {
            ErrorInfo::new("unknown_error", "daemon returned an error without details")
        });
        Err(ClientError::Rejected(info))
    }
}

fn send_with_retry(request: &Request) -> Result<Response, ClientError> {
    match send_request(request) {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::warn!(error = %err, method = ?request.method, "Failed to reach daemon");
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_request(request).map_err(|retry_err| {
                tracing::warn!(
                    error = %retry_err,
                    method = ?request.method,
                    "Retry failed reaching daemon"
                );
                ClientError::Unavailable(retry_err)
            })
        }
    }
}

fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let storage = StorageConfig::resolve().map_err(|err| err.to_string())?;
    Ok(storage.socket_path())
}

fn send_request(request: &Request) -> Result<Response, String> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket)
        .map_err(|err| format!("Failed to connect to daemon socket: {}", err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn to_params<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value)
        .map_err(|err| ClientError::InvalidResponse(format!("Failed to serialize params: {}", err)))
}

fn decode<T: DeserializeOwned>(data: Value, what: &str) -> Result<T, ClientError> {
    serde_json::from_value(data)
        .map_err(|err| ClientError::InvalidResponse(format!("{}: {}", what, err)))
}

fn make_request_id() -> String {
    let rand = rand::thread_rng().next_u64();
    format!(
        "req-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        rand
    )
}
