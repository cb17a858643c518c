//! The four packet kinds and their typed headers (§3 "Data model").
//!
//! Every packet carries a typed header plus an opaque content byte-string;
//! the codec (see [`crate::codec`]) never interprets `content`.

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub type ModuleId = String;

/// Formats "now" as ISO-8601 with millisecond precision, the timestamp
/// format every header field in §3 uses.
pub fn now_iso8601_millis() -> String {
    let now = OffsetDateTime::now_utc();
    // `Rfc3339` only emits fractional digits that are present, so round to
    // milliseconds first to get a stable 3-digit fraction every time.
    let millis = now.millisecond();
    let now = now.replace_nanosecond(millis as u32 * 1_000_000).unwrap_or(now);
    now.format(&Rfc3339).unwrap_or_else(|_| now.to_string())
}

/// Wire-stable response codes (§3). Values are part of the on-wire contract
/// and must never be renumbered.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum RespCode {
    UnLinked = 0,
    Bypass = 100,
    Success = 200,
    BadReq = 400,
    NotFound = 404,
    Timeout = 408,
    Error = 500,
}

impl RespCode {
    pub fn is_success(self) -> bool {
        matches!(self, RespCode::Success)
    }
}

/// Log severities (§3: `level ∈ {debug, warning, error}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub id: u64,
    pub from: ModuleId,
    pub to: ModuleId,
    pub route: String,
    #[serde(rename = "reqTime")]
    pub req_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub id: u64,
    pub from: ModuleId,
    pub to: ModuleId,
    pub route: String,
    #[serde(rename = "reqTime")]
    pub req_time: String,
    #[serde(rename = "respTime")]
    pub resp_time: String,
    #[serde(rename = "respCode")]
    pub resp_code: RespCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseHeader {
    /// Builds the response header for a request, swapping `from`/`to` and
    /// carrying the request id forward unchanged (§3 invariant).
    pub fn for_request(req: &RequestHeader, resp_code: RespCode, error: Option<String>) -> Self {
        ResponseHeader {
            id: req.id,
            from: req.to.clone(),
            to: req.from.clone(),
            route: req.route.clone(),
            req_time: req.req_time.clone(),
            resp_time: now_iso8601_millis(),
            resp_code,
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeHeader {
    pub id: u64,
    pub from: ModuleId,
    pub route: String,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub id: u64,
    pub from: ModuleId,
    pub level: LogLevel,
    #[serde(rename = "logTime")]
    pub log_time: String,
}

/// The four packet kinds (§3). `content` is opaque for everything except
/// `Log`, whose content is UTF-8 text by definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Request { header: RequestHeader, content: Bytes },
    Response { header: ResponseHeader, content: Bytes },
    Notice { header: NoticeHeader, content: Bytes },
    Log { header: LogHeader, content: String },
}

impl Packet {
    pub fn id(&self) -> u64 {
        match self {
            Packet::Request { header, .. } => header.id,
            Packet::Response { header, .. } => header.id,
            Packet::Notice { header, .. } => header.id,
            Packet::Log { header, .. } => header.id,
        }
    }

    pub fn from(&self) -> &str {
        match self {
            Packet::Request { header, .. } => &header.from,
            Packet::Response { header, .. } => &header.from,
            Packet::Notice { header, .. } => &header.from,
            Packet::Log { header, .. } => &header.from,
        }
    }

    /// The `to` field, present on requests and responses only.
    pub fn to(&self) -> Option<&str> {
        match self {
            Packet::Request { header, .. } => Some(&header.to),
            Packet::Response { header, .. } => Some(&header.to),
            Packet::Notice { .. } | Packet::Log { .. } => None,
        }
    }
}
