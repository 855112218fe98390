//! Wire types and validation for the focus guardian.
//!
//! This crate is shared by the background daemon and its clients (the page
//! bridge, the status view) to prevent schema drift. The daemon remains the
//! authority on validation, but clients reuse the same types to construct
//! valid requests.
//!
//! Two protocols live here:
//!
//! - The store protocol: newline-delimited JSON [`Request`]/[`Response`]
//!   envelopes exchanged with the daemon over its socket.
//! - The page protocol: [`PageMessage`] objects posted by the host web page
//!   to the bridge (`{type, payload}`), same-origin only.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

pub const ERROR_UNKNOWN_MESSAGE_TYPE: &str = "unknown_message_type";
pub const ERROR_INVALID_PARAMS: &str = "invalid_params";
pub const ERROR_MISSING_FIELD: &str = "missing_field";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    FlowSessionStart,
    FlowSessionEnd,
    GetSessionStatus,
    GetHealth,
    TabUpdated,
    TabActivated,
    TabRemoved,
    TakeOverlay,
    /// Anything outside the recognized set. Answered with
    /// [`ERROR_UNKNOWN_MESSAGE_TYPE`] instead of a parse failure.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, id: Option<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    /// The `{success: true}` acknowledgement used by session start/end.
    pub fn success(id: Option<String>) -> Self {
        Self::ok(id, serde_json::json!({ "success": true }))
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }

    pub fn unknown_message_type(id: Option<String>) -> Self {
        Self::error(id, ERROR_UNKNOWN_MESSAGE_TYPE, "Unknown message type")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session Record
// ═══════════════════════════════════════════════════════════════════════════════

/// The single focus session. Timestamps travel as epoch milliseconds, which is
/// also the persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub task_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allowed_sites: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub distractions: Vec<Distraction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distraction {
    pub site: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

/// Answer to `GET_SESSION_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_active: bool,
    pub session: Option<Session>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            is_active: false,
            session: None,
        }
    }
}

/// Current time truncated to the millisecond precision the wire format keeps,
/// so an in-memory record equals its persisted copy.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Payloads
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionPayload {
    pub task_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub allowed_sites: Vec<String>,
}

/// `sessionId` is accepted for forward compatibility; the store is a
/// singleton and never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabEventPayload {
    pub tab_id: u32,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRef {
    pub tab_id: u32,
}

/// A queued instruction to render the blocking overlay in one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCommand {
    pub tab_id: u32,
    pub hostname: String,
    pub task_id: String,
    pub url: String,
}

pub fn parse_start_session(params: Option<Value>) -> Result<StartSessionPayload, ErrorInfo> {
    let params =
        params.ok_or_else(|| ErrorInfo::new(ERROR_INVALID_PARAMS, "session payload is required"))?;
    parse_params(params, "session start")
}

pub fn parse_end_session(params: Option<Value>) -> Result<EndSessionPayload, ErrorInfo> {
    match params {
        None | Some(Value::Null) => Ok(EndSessionPayload::default()),
        Some(params) => parse_params(params, "session end"),
    }
}

pub fn parse_tab_event(params: Option<Value>) -> Result<TabEventPayload, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new(ERROR_MISSING_FIELD, "tabId is required"))?;
    parse_params(params, "tab event")
}

pub fn parse_tab_ref(params: Option<Value>) -> Result<TabRef, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new(ERROR_MISSING_FIELD, "tabId is required"))?;
    parse_params(params, "tab reference")
}

fn parse_params<T: DeserializeOwned>(params: Value, what: &str) -> Result<T, ErrorInfo> {
    if !params.is_object() {
        return Err(ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            "params must be an object",
        ));
    }
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            ERROR_INVALID_PARAMS,
            format!("{} payload is invalid: {}", what, err),
        )
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Page Messages
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessageType {
    FlowSessionStart,
    FlowSessionEnd,
    /// Pages post plenty of unrelated messages; these are not ours.
    #[serde(other)]
    Other,
}

/// `{type, payload}` as posted by the host page with `postMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMessage {
    #[serde(rename = "type")]
    pub message_type: PageMessageType,
    #[serde(default)]
    pub payload: Value,
}

impl PageMessage {
    pub fn start(task_id: &str, allowed_sites: &[String]) -> Self {
        Self {
            message_type: PageMessageType::FlowSessionStart,
            payload: serde_json::json!({
                "taskId": task_id,
                "allowedSites": allowed_sites,
            }),
        }
    }

    pub fn end(session_id: Option<&str>) -> Self {
        Self {
            message_type: PageMessageType::FlowSessionEnd,
            payload: serde_json::json!({ "sessionId": session_id }),
        }
    }
}
