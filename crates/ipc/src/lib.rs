//! IPC protocol models for logsight.
//!
//! Messages are bincode-encoded [`Request`]/[`Response`] values carried in
//! length-prefixed frames (see [`framing`]) over a local TCP socket. Every
//! request carries an id that the service echoes back.

pub mod client;
pub mod framing;

pub use core_types::ErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ADDR: &str = "127.0.0.1:7878";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub id: Uuid,
    pub query: String,
    pub top_k: u32,
    /// Server-side deadline for embedding + ranking; `None` uses the service default.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub rank: u32,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub id: Uuid,
    pub hits: Vec<SearchHit>,
    /// Entries in the snapshot that answered the query.
    pub total: u64,
    pub took_ms: u32,
    pub served_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub searches_total: u64,
    pub search_errors_total: u64,
    pub reloads_total: u64,
    pub search_latency_ms_avg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: Uuid,
    pub index_entries: u64,
    pub dimension: Option<u32>,
    pub index_location: String,
    pub provider: String,
    pub last_reload_ts: Option<i64>,
    pub metrics: Option<MetricsSnapshot>,
    pub served_by: Option<String>,
}

/// Ask the service to reload the index snapshot from storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub id: Uuid,
    pub index_entries: u64,
    pub dimension: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Search(SearchRequest),
    Status(StatusRequest),
    Reload(ReloadRequest),
}

impl Request {
    pub fn id(&self) -> Uuid {
        match self {
            Request::Search(r) => r.id,
            Request::Status(r) => r.id,
            Request::Reload(r) => r.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Search(SearchResponse),
    Status(StatusResponse),
    Reload(ReloadResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn id(&self) -> Uuid {
        match self {
            Response::Search(r) => r.id,
            Response::Status(r) => r.id,
            Response::Reload(r) => r.id,
            Response::Error(r) => r.id,
        }
    }

    pub fn error(id: Uuid, kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error(ErrorResponse {
            id,
            kind,
            message: message.into(),
        })
    }
}
