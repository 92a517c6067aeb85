//! Request → engine options → Response.
//!
//! # Overview
//! `Transport::send` derives an `EngineOptions` set from a `Request`, lets
//! the engine run the exchange, and collects the status line, header lines
//! and body chunks it reports into a fresh `Response`.
//!
//! # Design
//! - One engine per transport, reset at the start of every call. `send`
//!   takes `&mut self`, so a transport serves one exchange at a time; use
//!   one transport per concurrent request.
//! - Option precedence is field-wise: computed from the request, then the
//!   caller's passthrough set, then transport defaults.
//! - 4xx/5xx statuses are ordinary responses. Only an engine failure is an
//!   error (`Error::Transport`).
//! - Repeated response header lines are appended. A new status line
//!   (interim 1xx, redirect hop) clears the headers collected so far.

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::engine::{EngineOptions, HttpVersion, PassthroughOptions, TransferEngine, TransferSink, UreqEngine};
use crate::error::{Error, Result, TransportError};
use crate::headers::Headers;
use crate::http::Method;
use crate::message::Message;
use crate::params::{self, Params};
use crate::request::Request;
use crate::response::Response;
use crate::status;

pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

fn default_options() -> EngineOptions {
    EngineOptions {
        http_version: Some(HttpVersion::None),
        user_agent: Some(DEFAULT_USER_AGENT.to_string()),
        follow_location: Some(false),
        ..EngineOptions::default()
    }
}

/// Sends requests through a `TransferEngine`.
#[derive(Debug)]
pub struct Transport<E: TransferEngine = UreqEngine> {
    engine: E,
    passthrough: PassthroughOptions,
    defaults: EngineOptions,
}

impl Default for Transport<UreqEngine> {
    fn default() -> Self {
        Self::new(UreqEngine::new())
    }
}

impl<E: TransferEngine> Transport<E> {
    pub fn new(engine: E) -> Self {
        Self::with_options(engine, PassthroughOptions::default())
    }

    /// A transport with caller passthrough options. They only fill in what
    /// the request itself does not determine.
    pub fn with_options(engine: E, options: PassthroughOptions) -> Self {
        Self {
            engine,
            passthrough: options,
            defaults: default_options(),
        }
    }

    /// Like `with_options`, reading the passthrough set from JSON.
    pub fn with_json_options(engine: E, json: &str) -> Result<Self> {
        let options = PassthroughOptions::from_json(json)
            .map_err(|e| Error::invalid_input(format!("invalid engine options: {e}")))?;
        Ok(Self::with_options(engine, options))
    }

    /// Layer more passthrough options on top of the current ones.
    pub fn set_options(&mut self, options: PassthroughOptions) -> &mut Self {
        self.passthrough = options.merge(&self.passthrough);
        self
    }

    pub fn options(&self) -> &PassthroughOptions {
        &self.passthrough
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run one blocking exchange. The request body stream is read (and left
    /// rewound) when it supplies the payload.
    pub fn send(&mut self, request: &mut Request) -> Result<Response> {
        self.engine.reset();
        let options = engine_options(request)?
            .merge(&EngineOptions::from(&self.passthrough))
            .merge(&self.defaults);
        debug!(
            method = %request.method(),
            host = request.uri().host(),
            path = request.uri().path(),
            payload = options.post_fields.as_ref().map_or(0, Vec::len),
            "sending request"
        );

        let mut response = Response::new();
        let outcome = self.engine.perform(&options, &mut ResponseSink { response: &mut response });
        if let Err(e) = outcome {
            warn!(kind = %e.kind, error = %e.message, "transfer failed");
            return Err(TransportError::from(e).into());
        }

        response.body_mut().rewind()?;
        debug!(status = response.status_code(), "response received");
        Ok(response)
    }
}

/// Derive the engine options a request determines.
pub fn engine_options(request: &mut Request) -> Result<EngineOptions> {
    let mut options = EngineOptions {
        url: Some(request.uri().to_string()),
        http_version: Some(http_version(request.protocol_version())?),
        ..EngineOptions::default()
    };

    let payload = match request.method() {
        Method::Head => {
            options.no_body = Some(true);
            None
        }
        Method::Get => None,
        method => {
            options.custom_request = Some(method.as_str().to_string());
            encode_payload(request)?
        }
    };

    options.http_header = Some(header_lines(request.headers(), payload.as_deref()));
    options.post_fields = payload;
    if !request.uri().user().is_empty() {
        options.user_pwd = Some(request.uri().user_info());
    }
    Ok(options)
}

/// Map a message protocol version to the engine's version flag.
pub fn http_version(version: &str) -> Result<HttpVersion> {
    match version {
        "" => Ok(HttpVersion::None),
        "1.0" => Ok(HttpVersion::V1_0),
        "1.1" => Ok(HttpVersion::V1_1),
        "2" | "2.0" => Ok(HttpVersion::V2_0),
        "3" | "3.0" => Ok(HttpVersion::V3),
        other => Err(Error::invalid_input(format!("Unsupported protocol version: {other}"))),
    }
}

/// The request payload: the parsed body (a string verbatim, otherwise JSON
/// or form encoded by `content-type`), else the non-empty body stream.
fn encode_payload(request: &mut Request) -> Result<Option<Vec<u8>>> {
    match request.parsed_body() {
        Some(Value::String(raw)) if !raw.is_empty() => return Ok(Some(raw.into_bytes())),
        Some(value) if !is_empty_value(&value) => {
            let encoded = if request.header_line("content-type") == "application/json" {
                serde_json::to_vec(&value).map_err(|e| Error::invalid_input(format!("unencodable body: {e}")))?
            } else {
                form_encode(value).into_bytes()
            };
            return Ok(Some(encoded));
        }
        _ => {}
    }

    let body = request.body_mut();
    if !body.is_attached() || !body.is_readable() {
        return Ok(None);
    }
    body.rewind()?;
    let contents = body.contents()?;
    body.rewind()?;
    Ok(Some(contents).filter(|c| !c.is_empty()))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn form_encode(value: Value) -> String {
    match value {
        Value::Object(map) => params::build_query(&map),
        Value::Array(items) => {
            let map: Params = items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect();
            params::build_query(&map)
        }
        scalar => params::scalar_to_string(&scalar).unwrap_or_default(),
    }
}

/// Project request headers to raw lines. `Expect` is dropped,
/// `Content-Length` follows the payload, and an empty `Expect:` comes last.
fn header_lines(headers: &Headers, payload: Option<&[u8]>) -> Vec<String> {
    let mut lines = Vec::with_capacity(headers.len() + 1);
    for (name, values) in headers.iter() {
        if name.eq_ignore_ascii_case("expect") {
            continue;
        }
        if name.eq_ignore_ascii_case("content-length") {
            lines.push(format!("{name}: {}", payload.map_or(0, <[u8]>::len)));
        } else {
            lines.push(format!("{name}: {}", values.join(",")));
        }
    }
    lines.push("Expect:".to_string());
    lines
}

/// Writes what the engine reports into the response under construction.
struct ResponseSink<'a> {
    response: &'a mut Response,
}

impl ResponseSink<'_> {
    fn status_line(&mut self, line: &str) {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().and_then(|v| v.get(5..)).unwrap_or_default();
        let code = parts.next().and_then(|c| c.trim().parse::<u16>().ok());
        let wire_reason = parts.next().map(str::trim).unwrap_or_default();

        let Some(code) = code else {
            warn!(line, "unparsable status line");
            return;
        };
        let reason = match status::reason_phrase(code) {
            Some(phrase) => phrase,
            None if !wire_reason.is_empty() => wire_reason,
            None => "Unknown",
        };
        self.response.headers_mut().clear();
        if !version.is_empty() {
            self.response.with_protocol_version(version);
        }
        if let Err(e) = self.response.with_status(code, Some(reason)) {
            warn!(line, error = %e, "rejected status line");
        }
    }
}

impl TransferSink for ResponseSink<'_> {
    fn header(&mut self, raw: &[u8]) -> usize {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return raw.len();
        }
        trace!(line, "header line");

        if line.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("http/")) {
            self.status_line(line);
        } else if let Some((name, value)) = line.split_once(':') {
            self.response.with_added_header(name.trim(), value.trim());
        } else {
            trace!(line, "ignoring header line without colon");
        }
        raw.len()
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        match self.response.body_mut().write(chunk) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "response body write failed");
                0
            }
        }
    }
}
