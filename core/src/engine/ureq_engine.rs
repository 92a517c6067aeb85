//! Default transfer engine backed by a reusable `ureq::Agent`.
//!
//! The agent (and with it the connection pool) survives `reset`; it is
//! rebuilt only when the timeout or redirect configuration changes between
//! calls. Responses are replayed to the sink as a synthetic status line,
//! one line per header, a blank line, then body chunks.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use base64ct::{Base64, Encoding};
use tracing::{debug, trace};
use ureq::http::{self, Method, Version};
use ureq::Agent;

use super::{deliver_chunk, deliver_header, EngineError, EngineErrorKind, EngineOptions, HttpVersion, TransferEngine, TransferSink};

const CHUNK_SIZE: usize = 16 * 1024;
const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// The parts of `EngineOptions` that are baked into an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AgentKey {
    connect_timeout_ms: Option<u64>,
    timeout_ms: Option<u64>,
    max_redirects: u32,
}

impl AgentKey {
    fn from_options(options: &EngineOptions) -> Self {
        let max_redirects = if options.follow_location.unwrap_or(false) {
            options.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS)
        } else {
            0
        };
        Self {
            connect_timeout_ms: options.connect_timeout_ms,
            timeout_ms: options.timeout_ms,
            max_redirects,
        }
    }

    fn build(&self) -> Agent {
        Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .timeout_connect(self.connect_timeout_ms.map(Duration::from_millis))
            .timeout_global(self.timeout_ms.map(Duration::from_millis))
            .max_redirects(self.max_redirects)
            .build()
            .new_agent()
    }
}

#[derive(Default)]
pub struct UreqEngine {
    agent: Option<(AgentKey, Agent)>,
    calls: u64,
}

impl fmt::Debug for UreqEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqEngine")
            .field("agent", &self.agent.as_ref().map(|(key, _)| key))
            .field("calls", &self.calls)
            .finish()
    }
}

impl UreqEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent_for(&mut self, options: &EngineOptions) -> Agent {
        let key = AgentKey::from_options(options);
        match &self.agent {
            Some((cached, agent)) if *cached == key => agent.clone(),
            _ => {
                debug!(?key, "building ureq agent");
                let agent = key.build();
                self.agent = Some((key, agent.clone()));
                agent
            }
        }
    }
}

impl TransferEngine for UreqEngine {
    fn reset(&mut self) {
        self.calls += 1;
    }

    fn perform(&mut self, options: &EngineOptions, sink: &mut dyn TransferSink) -> Result<(), EngineError> {
        let raw_url = options
            .url
            .as_deref()
            .ok_or_else(|| EngineError::new(EngineErrorKind::MalformedUrl, "no URL set"))?;
        let (url, url_credentials) = split_credentials(raw_url);
        let method = match (&options.custom_request, options.no_body) {
            (Some(custom), _) => Method::from_bytes(custom.as_bytes())
                .map_err(|e| EngineError::new(EngineErrorKind::Other, format!("invalid method {custom}: {e}")))?,
            (None, Some(true)) => Method::HEAD,
            (None, _) => Method::GET,
        };

        let mut builder = http::Request::builder().method(method.clone()).uri(url.as_str());
        match options.http_version.unwrap_or_default() {
            HttpVersion::None => {}
            HttpVersion::V1_0 => builder = builder.version(Version::HTTP_10),
            HttpVersion::V1_1 => builder = builder.version(Version::HTTP_11),
            v @ (HttpVersion::V2_0 | HttpVersion::V3) => {
                return Err(EngineError::new(
                    EngineErrorKind::UnsupportedProtocol,
                    format!("HTTP version {v:?} is not supported by this engine"),
                ));
            }
        }

        let mut has_user_agent = false;
        let mut has_authorization = false;
        for line in options.http_header.iter().flatten() {
            let Some((name, value)) = line.split_once(':') else { continue };
            let (name, value) = (name.trim(), value.trim());
            // Empty value: suppress the header. Content-Length is derived from the payload.
            if value.is_empty() || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            has_user_agent |= name.eq_ignore_ascii_case("user-agent");
            has_authorization |= name.eq_ignore_ascii_case("authorization");
            builder = builder.header(name, value);
        }
        if !has_user_agent {
            if let Some(agent) = &options.user_agent {
                builder = builder.header("User-Agent", agent.as_str());
            }
        }
        if !has_authorization {
            if let Some(credentials) = options.user_pwd.clone().or(url_credentials) {
                let credentials = if credentials.contains(':') { credentials } else { format!("{credentials}:") };
                let token = Base64::encode_string(credentials.as_bytes());
                builder = builder.header("Authorization", format!("Basic {token}"));
            }
        }

        let agent = self.agent_for(options);
        debug!(call = self.calls, %method, url = %url, "performing transfer");

        let payload = options.post_fields.as_deref();
        let sends_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let result = match payload {
            Some(bytes) if !bytes.is_empty() || sends_body => builder.body(bytes).map(|req| agent.run(req)),
            _ if sends_body => builder.body(&b""[..]).map(|req| agent.run(req)),
            _ => builder.body(()).map(|req| agent.run(req)),
        };
        let response = result
            .map_err(|e| EngineError::new(EngineErrorKind::MalformedUrl, e.to_string()))?
            .map_err(map_ureq_error)?;

        let status = response.status();
        let status_line = format!(
            "HTTP/{} {} {}\r\n",
            version_str(response.version()),
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        );
        deliver_header(sink, &status_line)?;
        for (name, value) in response.headers() {
            let line = format!("{}: {}\r\n", name.as_str(), String::from_utf8_lossy(value.as_bytes()));
            trace!(line = line.trim_end(), "response header");
            deliver_header(sink, &line)?;
        }
        deliver_header(sink, "\r\n")?;

        if options.no_body.unwrap_or(false) || method == Method::HEAD {
            return Ok(());
        }

        let mut reader = response.into_body().into_reader();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).map_err(map_read_error)?;
            if n == 0 {
                break;
            }
            deliver_chunk(sink, &buf[..n])?;
        }
        Ok(())
    }
}

/// Remove `user:password@` from the authority, returning it separately.
fn split_credentials(url: &str) -> (String, Option<String>) {
    let Some(scheme_end) = url.find("://") else {
        return (url.to_string(), None);
    };
    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => {
            let credentials = rest[..at].to_string();
            let stripped = format!("{}{}", &url[..scheme_end + 3], &rest[at + 1..]);
            (stripped, Some(credentials).filter(|c| !c.is_empty()))
        }
        None => (url.to_string(), None),
    }
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn map_ureq_error(e: ureq::Error) -> EngineError {
    let kind = match &e {
        ureq::Error::Timeout(_) => EngineErrorKind::Timeout,
        ureq::Error::HostNotFound => EngineErrorKind::ResolveHost,
        ureq::Error::ConnectionFailed => EngineErrorKind::Connect,
        ureq::Error::BadUri(_) => EngineErrorKind::MalformedUrl,
        ureq::Error::Io(io) => match io.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => EngineErrorKind::Connect,
            io::ErrorKind::TimedOut => EngineErrorKind::Timeout,
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => EngineErrorKind::Send,
            _ => EngineErrorKind::Recv,
        },
        _ => EngineErrorKind::Other,
    };
    EngineError::new(kind, e.to_string())
}

fn map_read_error(e: io::Error) -> EngineError {
    let kind = match e.kind() {
        io::ErrorKind::TimedOut => EngineErrorKind::Timeout,
        _ => EngineErrorKind::Recv,
    };
    EngineError::new(kind, e.to_string())
}
