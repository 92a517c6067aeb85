//! HTTP response with status, reason phrase and outgoing cookies.

use std::collections::BTreeMap;
use std::io::Write;

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::message::{Message, DEFAULT_PROTOCOL_VERSION};
use crate::status;
use crate::stream::Stream;

#[derive(Debug)]
pub struct Response {
    version: String,
    status: u16,
    reason: String,
    headers: Headers,
    body: Stream,
    cookies: BTreeMap<String, Cookie>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// `200 OK`, no headers, empty in-memory body.
    pub fn new() -> Self {
        Self {
            version: DEFAULT_PROTOCOL_VERSION.to_string(),
            status: 200,
            reason: "OK".to_string(),
            headers: Headers::new(),
            body: Stream::memory(),
            cookies: BTreeMap::new(),
        }
    }

    /// A response whose body holds `content`, positioned at the start.
    pub fn with_content(content: impl Into<Vec<u8>>, status: u16) -> Result<Self> {
        let mut response = Self::new();
        response.with_status(status, None)?;
        response.body = Stream::from_bytes(content);
        Ok(response)
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Set the status. Without a phrase (or with an empty one) the phrase
    /// comes from the status table, and an unknown code is rejected.
    pub fn with_status(&mut self, code: u16, reason: Option<&str>) -> Result<&mut Self> {
        let reason = match reason.filter(|r| !r.is_empty()) {
            Some(reason) => reason,
            None => status::reason_phrase(code)
                .ok_or_else(|| Error::invalid_input(format!("Invalid status code: {code}")))?,
        };
        self.status = code;
        self.reason = reason.to_string();
        Ok(self)
    }

    pub fn cookies(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }

    /// Add a cookie, replacing one with the same name.
    pub fn with_cookie(&mut self, cookie: Cookie) -> &mut Self {
        self.cookies.insert(cookie.name().to_string(), cookie);
        self
    }

    pub fn without_cookie(&mut self, name: &str) -> &mut Self {
        self.cookies.remove(name);
        self
    }

    /// Emit the response: status line, headers, one `Set-Cookie` line per
    /// cookie, a blank line, then the whole body.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> Result<()> {
        write!(out, "HTTP/{} {} {}\r\n", self.version, self.status, self.reason)?;
        for name in self.headers.names() {
            write!(out, "{name}: {}\r\n", self.headers.line(name))?;
        }
        for cookie in self.cookies.values() {
            write!(out, "Set-Cookie: {}\r\n", cookie.to_header_value())?;
        }
        out.write_all(b"\r\n")?;
        self.body.rewind()?;
        out.write_all(&self.body.contents()?)?;
        out.flush()?;
        Ok(())
    }
}

impl Message for Response {
    fn protocol_version(&self) -> &str {
        &self.version
    }

    fn with_protocol_version(&mut self, version: &str) -> &mut Self {
        self.version = version.to_string();
        self
    }

    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn body(&self) -> &Stream {
        &self.body
    }

    fn body_mut(&mut self) -> &mut Stream {
        &mut self.body
    }

    fn with_body(&mut self, body: Stream) -> &mut Self {
        self.body = body;
        self
    }
}
