//! The transfer engine seam.
//!
//! # Overview
//! A transfer engine performs one blocking HTTP exchange per `perform` call
//! and reports what it receives through a `TransferSink`: one `header` call
//! per raw response line (status line first), then one `write` call per body
//! chunk. A sink that consumes fewer bytes than offered aborts the transfer.
//!
//! Engines are reusable: `reset` clears per-call state but keeps whatever
//! connection machinery the engine owns. An engine handle serves one
//! exchange at a time.

use std::fmt;

use serde::Deserialize;

pub mod scripted;
pub mod ureq_engine;

pub use scripted::ScriptedEngine;
pub use ureq_engine::UreqEngine;

/// Protocol version flag. `None` lets the engine pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpVersion {
    #[default]
    None,
    V1_0,
    V1_1,
    V2_0,
    V3,
}

/// The engine option table. Every field is optional so that option sets
/// can be layered with `merge`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub url: Option<String>,
    pub http_version: Option<HttpVersion>,
    /// Do not retrieve a response body.
    pub no_body: Option<bool>,
    /// Method override for anything but GET and HEAD.
    pub custom_request: Option<String>,
    pub post_fields: Option<Vec<u8>>,
    /// Raw `Name: value` request header lines. A line with an empty value
    /// suppresses that header.
    pub http_header: Option<Vec<String>>,
    /// `user[:password]`.
    pub user_pwd: Option<String>,
    pub user_agent: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub follow_location: Option<bool>,
    pub max_redirects: Option<u32>,
}

macro_rules! merge_fields {
    ($dst:ident, $src:ident; $($field:ident),* $(,)?) => {
        $(
            if $dst.$field.is_none() {
                $dst.$field = $src.$field.clone();
            }
        )*
    };
}

impl EngineOptions {
    /// Fill every unset field from `lower`. Fields already set win.
    pub fn merge(mut self, lower: &EngineOptions) -> Self {
        merge_fields!(self, lower;
            url, http_version, no_body, custom_request, post_fields, http_header,
            user_pwd, user_agent, connect_timeout_ms, timeout_ms, follow_location, max_redirects,
        );
        self
    }
}

/// Caller-tunable options. Everything a request determines (URL, version,
/// method, payload, header lines) is absent here, so a passthrough set can
/// never override it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PassthroughOptions {
    pub user_agent: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub follow_location: Option<bool>,
    pub max_redirects: Option<u32>,
}

impl PassthroughOptions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Fill every unset field from `lower`. Fields already set win.
    pub fn merge(mut self, lower: &PassthroughOptions) -> Self {
        merge_fields!(self, lower;
            user_agent, connect_timeout_ms, timeout_ms, follow_location, max_redirects,
        );
        self
    }
}

impl From<&PassthroughOptions> for EngineOptions {
    fn from(options: &PassthroughOptions) -> Self {
        Self {
            user_agent: options.user_agent.clone(),
            connect_timeout_ms: options.connect_timeout_ms,
            timeout_ms: options.timeout_ms,
            follow_location: options.follow_location,
            max_redirects: options.max_redirects,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    UnsupportedProtocol,
    MalformedUrl,
    ResolveHost,
    Connect,
    Timeout,
    Send,
    Recv,
    /// A sink callback consumed fewer bytes than offered.
    WriteAborted,
    Other,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineErrorKind::UnsupportedProtocol => "unsupported protocol",
            EngineErrorKind::MalformedUrl => "malformed url",
            EngineErrorKind::ResolveHost => "could not resolve host",
            EngineErrorKind::Connect => "could not connect",
            EngineErrorKind::Timeout => "timeout",
            EngineErrorKind::Send => "send failure",
            EngineErrorKind::Recv => "receive failure",
            EngineErrorKind::WriteAborted => "write aborted",
            EngineErrorKind::Other => "engine failure",
        };
        f.write_str(s)
    }
}

/// The engine's error indicator together with its diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Receives what an engine reads off the wire.
pub trait TransferSink {
    /// One raw header line, including its line terminator. Returns the
    /// number of bytes consumed.
    fn header(&mut self, line: &[u8]) -> usize;

    /// One body chunk. Returns the number of bytes consumed.
    fn write(&mut self, chunk: &[u8]) -> usize;
}

/// A synchronous HTTP transfer engine.
pub trait TransferEngine {
    /// Clear per-call option state.
    fn reset(&mut self);

    /// Run one exchange, blocking until it completes or fails.
    fn perform(&mut self, options: &EngineOptions, sink: &mut dyn TransferSink) -> Result<(), EngineError>;
}

impl<E: TransferEngine + ?Sized> TransferEngine for Box<E> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn perform(&mut self, options: &EngineOptions, sink: &mut dyn TransferSink) -> Result<(), EngineError> {
        (**self).perform(options, sink)
    }
}

/// Feed one header line to the sink, failing when it is not fully consumed.
pub(crate) fn deliver_header(sink: &mut dyn TransferSink, line: &str) -> Result<(), EngineError> {
    let consumed = sink.header(line.as_bytes());
    if consumed != line.len() {
        return Err(EngineError::new(
            EngineErrorKind::WriteAborted,
            format!("header callback consumed {consumed} of {} bytes", line.len()),
        ));
    }
    Ok(())
}

/// Feed one body chunk to the sink, failing when it is not fully consumed.
pub(crate) fn deliver_chunk(sink: &mut dyn TransferSink, chunk: &[u8]) -> Result<(), EngineError> {
    let consumed = sink.write(chunk);
    if consumed != chunk.len() {
        return Err(EngineError::new(
            EngineErrorKind::WriteAborted,
            format!("body callback consumed {consumed} of {} bytes", chunk.len()),
        ));
    }
    Ok(())
}
