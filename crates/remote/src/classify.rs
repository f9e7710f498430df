//! Transport failure classification.
//!
//! Maps whatever a transport reported into a closed set of kinds that the
//! publisher uses for logging and abort decisions. Classification is total:
//! unknown inputs become [`ErrorKind::Unknown`] with the raw code kept.

use std::fmt;
use std::io;

use serde::Serialize;

use crate::RemoteError;

/// Closed taxonomy of remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Timeout,
    AlreadyExists,
    ParentMissing,
    ServerInternal,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    LoopDetected,
    /// Anything else; carries the HTTP status when there was one.
    Unknown(Option<u16>),
}

impl ErrorKind {
    /// Maps an HTTP status code to its kind.
    pub fn from_status(code: u16) -> Self {
        match code {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            408 => Self::Timeout,
            // WebDAV answers 409 when an intermediate collection is missing.
            409 => Self::ParentMissing,
            412 => Self::AlreadyExists,
            500 => Self::ServerInternal,
            501 => Self::NotImplemented,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            504 => Self::GatewayTimeout,
            508 => Self::LoopDetected,
            other => Self::Unknown(Some(other)),
        }
    }

    /// Short operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BadRequest => "Bad request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not found",
            Self::MethodNotAllowed => "Method not allowed",
            Self::Timeout => "Request timeout",
            Self::AlreadyExists => "Already exists",
            Self::ParentMissing => "Parent directory missing",
            Self::ServerInternal => "Internal error",
            Self::NotImplemented => "Not implemented",
            Self::BadGateway => "Bad gateway",
            Self::ServiceUnavailable => "Service unavailable",
            Self::GatewayTimeout => "Gateway timeout",
            Self::LoopDetected => "Loop detected",
            Self::Unknown(_) => "Unknown error",
        }
    }

    /// Worth retrying later by an external policy.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ServiceUnavailable | Self::BadGateway | Self::GatewayTimeout
        )
    }

    /// Authentication or authorization failure; retrying will not help.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }

    /// Misconfigured target or a race on the remote tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::NotFound | Self::ParentMissing)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(Some(code)) => write!(f, "{} ({code})", self.label()),
            _ => f.write_str(self.label()),
        }
    }
}

/// A classified failure with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Operator hint for the most common misconfigurations.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            ErrorKind::Unauthorized => Some("credentials are likely wrong"),
            ErrorKind::NotFound => Some("check the server URL and upload path"),
            _ => None,
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Classifies a transport failure. Never fails.
pub fn classify(err: &RemoteError) -> ClassifiedError {
    match err {
        RemoteError::Status { status: 401, .. } => ClassifiedError::new(
            ErrorKind::Unauthorized,
            "HTTP error 401 encountered, credentials are likely wrong",
        ),
        RemoteError::Status { status, reason } => {
            let kind = ErrorKind::from_status(*status);
            let phrase = match kind {
                ErrorKind::Unknown(_) if !reason.is_empty() => reason.as_str(),
                _ => kind.label(),
            };
            ClassifiedError::new(kind, format!("HTTP error encountered: {status} {phrase}"))
        }
        RemoteError::NotFound(path) => {
            ClassifiedError::new(ErrorKind::NotFound, format!("resource not found: {path}"))
        }
        RemoteError::AlreadyExists(path) => {
            ClassifiedError::new(ErrorKind::AlreadyExists, format!("already exists: {path}"))
        }
        RemoteError::ParentMissing(path) => ClassifiedError::new(
            ErrorKind::ParentMissing,
            format!("parent directory missing: {path}"),
        ),
        RemoteError::Timeout(after) => {
            ClassifiedError::new(ErrorKind::Timeout, format!("request timed out after {after:?}"))
        }
        RemoteError::Io(e) => ClassifiedError::new(io_kind(e.kind()), format!("I/O error: {e}")),
        RemoteError::Protocol(msg) => {
            ClassifiedError::new(ErrorKind::Unknown(None), format!("protocol error: {msg}"))
        }
    }
}

fn io_kind(kind: io::ErrorKind) -> ErrorKind {
    match kind {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Forbidden,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        _ => ErrorKind::Unknown(None),
    }
}
