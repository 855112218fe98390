//! Focus guardian daemon entrypoint.
//!
//! The daemon is the background context: it owns the single Session Store,
//! observes tab events reported by the host, and queues overlays for the host
//! to render. Hosts talk to it over a Unix socket with newline-delimited JSON.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use focus_guardian_protocol::{
    parse_end_session, parse_start_session, parse_tab_event, parse_tab_ref, ErrorInfo, Method,
    Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use guardian_core::StorageConfig;

mod outbox;
mod state;

use state::{SharedState, TabSignal};

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const DEBUG_LOG_ENV: &str = "FOCUS_GUARDIAN_DEBUG_LOG";

fn main() {
    init_logging();

    let storage = match StorageConfig::resolve() {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve guardian storage root");
            std::process::exit(1);
        }
    };

    if let Err(err) = storage.ensure_root() {
        error!(error = %err, "Failed to prepare guardian storage root");
        std::process::exit(1);
    }

    let shared_state = Arc::new(SharedState::from_storage(&storage));

    let socket_path = storage.socket_path();
    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind guardian socket");
            std::process::exit(1);
        }
    };

    info!(
        path = %socket_path.display(),
        active = shared_state.is_active(),
        "Focus guardian daemon started"
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept guardian connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Guardian request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
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
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => Response::ok(
            request.id,
            serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "active": state.is_active(),
                "pending_overlays": state.pending_overlays(),
            }),
        ),
        Method::FlowSessionStart => {
            let payload = match parse_start_session(request.params) {
                Ok(payload) => payload,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            state.start_session(&payload);
            Response::success(request.id)
        }
        Method::FlowSessionEnd => {
            if let Err(err) = parse_end_session(request.params) {
                return Response::error_with_info(request.id, err);
            }
            if state.end_session().is_none() {
                tracing::debug!("End requested with no active session");
            }
            Response::success(request.id)
        }
        Method::GetSessionStatus => to_response(request.id, &state.status(), "session status"),
        Method::TabUpdated | Method::TabActivated => {
            let signal = if request.method == Method::TabUpdated {
                TabSignal::Updated
            } else {
                TabSignal::Activated
            };
            let event = match parse_tab_event(request.params) {
                Ok(event) => event,
                Err(err) => return Response::error_with_info(request.id, err),
            };
            let verdict = state.tab_event(signal, &event);
            tracing::debug!(tab_id = event.tab_id, verdict = ?verdict, "Tab event evaluated");
            to_response(request.id, &verdict, "verdict")
        }
        Method::TabRemoved => match parse_tab_ref(request.params) {
            Ok(tab) => {
                state.tab_removed(tab.tab_id);
                Response::ok(request.id, serde_json::json!({ "accepted": true }))
            }
            Err(err) => Response::error_with_info(request.id, err),
        },
        Method::TakeOverlay => match parse_tab_ref(request.params) {
            Ok(tab) => to_response(request.id, &state.take_overlay(tab.tab_id), "overlay command"),
            Err(err) => Response::error_with_info(request.id, err),
        },
        Method::Unknown => {
            tracing::debug!(id = ?request.id, "Unknown message type");
            Response::unknown_message_type(request.id)
        }
    }
}

fn to_response<T: serde::Serialize>(id: Option<String>, value: &T, what: &str) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize {}: {}", what, err),
        ),
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
