//! Core log-domain types shared across the logsight workspace.
//!
//! These types stay free of index/search dependencies so that the worker,
//! the service and the CLI can all speak about log events the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod config;

pub type Timestamp = String; // ISO-8601 as emitted by producers; kept opaque.

/// Sample natural-language queries surfaced to users who are new to semantic search.
pub const EXAMPLE_QUERIES: &[&str] = &[
    "Find logs related to authentication failures",
    "Show me critical errors from payments service",
    "Logs where the user login failed",
    "High latency or timeout logs",
    "Order processing failures in any region",
];

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    #[serde(alias = "WARN")]
    Warning,
    Error,
    #[serde(alias = "FATAL")]
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// Severities that would be routed to the alerting queue upstream.
    pub const fn is_alerting(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity level: {0}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" | "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" | "FATAL" => Ok(Severity::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// Failure categories of the search subsystem, shared by the library and the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Corruption,
    DimensionMismatch,
    Storage,
    Provider,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Corruption,
        ErrorKind::DimensionMismatch,
        ErrorKind::Storage,
        ErrorKind::Provider,
        ErrorKind::Timeout,
        ErrorKind::Internal,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Corruption => "corruption",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::Storage => "storage",
            ErrorKind::Provider => "provider",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }

    /// Operator-facing hint for the kinds that have a well-known remedy.
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            ErrorKind::NotFound => Some("no index built yet, run indexing first"),
            ErrorKind::DimensionMismatch => {
                Some("index built with a different embedding model than the current query")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_region() -> String {
    "eastus".to_string()
}

/// One application log event as produced by the ingestion path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    pub level: Severity,
    pub service: String,
    pub message: String,
    #[serde(default = "default_region")]
    pub region: String,
}

impl LogEvent {
    pub fn new(level: Severity, service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: None,
            level,
            service: service.into(),
            message: message.into(),
            region: default_region(),
        }
    }
}
