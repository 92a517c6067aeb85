//! Error types for the courier HTTP client.
//!
//! # Design
//! Two disjoint families share one enum. Input errors (`InvalidInput`) are
//! raised by the call that violates a contract and leave prior state
//! unchanged. Transport errors (`Transport`) come from the transfer engine
//! after an exchange attempt and are never retried. Stream failures get
//! their own variants so callers can tell an unseekable handle from a
//! failed seek or a closed stream.
//!
//! HTTP status codes in the 4xx/5xx range are not errors here: they arrive
//! as ordinary `Response` values.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::engine::{EngineError, EngineErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the message model, the body stream and the transport.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value breaks a contract: bad host, port out of
    /// range, unknown method, unknown status code without a phrase, ...
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The stream's handle cannot seek.
    #[error("stream is not seekable")]
    NotSeekable,

    /// The low-level seek failed.
    #[error("unable to seek to stream position {offset} with whence {whence}")]
    SeekFailed { offset: i64, whence: Whence },

    /// The stream is closed, detached, or not opened for the operation.
    #[error("stream state error: {reason}")]
    StreamState { reason: String },

    /// A low-level read, write or stat failed.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The transfer engine reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    pub fn invalid_input<S: ToString>(reason: S) -> Self {
        Self::InvalidInput { reason: reason.to_string() }
    }

    pub fn stream_state<S: ToString>(reason: S) -> Self {
        Self::StreamState { reason: reason.to_string() }
    }

    pub fn seek_failed(offset: i64, whence: Whence) -> Self {
        Self::SeekFailed { offset, whence }
    }
}

/// Reference point for `Stream::seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl fmt::Display for Whence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Whence::Set => write!(f, "SEEK_SET"),
            Whence::Current => write!(f, "SEEK_CUR"),
            Whence::End => write!(f, "SEEK_END"),
        }
    }
}

/// A transport-level failure: DNS, connect, TLS, timeout, aborted transfer.
///
/// Carries the engine's diagnostic text verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl From<EngineError> for TransportError {
    fn from(e: EngineError) -> Self {
        Self {
            kind: e.kind,
            message: e.message,
        }
    }
}
