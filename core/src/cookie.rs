//! Named cookie value object.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Date formats accepted for textual expiry, tried in order after RFC 2822
/// and RFC 3339.
const EXPIRY_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%a, %d-%b-%Y %H:%M:%S GMT"];

/// Ways to express a cookie's expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// Unix timestamp in seconds; `0` means a session cookie.
    Timestamp(i64),
    DateTime(DateTime<Utc>),
    /// A numeric string or a date string.
    Text(String),
}

impl From<i64> for Expiry {
    fn from(ts: i64) -> Self {
        Expiry::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(dt: DateTime<Utc>) -> Self {
        Expiry::DateTime(dt)
    }
}

impl From<&str> for Expiry {
    fn from(s: &str) -> Self {
        Expiry::Text(s.to_string())
    }
}

impl From<String> for Expiry {
    fn from(s: String) -> Self {
        Expiry::Text(s)
    }
}

impl Expiry {
    fn to_timestamp(&self) -> Result<i64> {
        match self {
            Expiry::Timestamp(ts) => Ok(*ts),
            Expiry::DateTime(dt) => Ok(dt.timestamp()),
            Expiry::Text(text) => parse_expiry(text.trim())
                .ok_or_else(|| Error::invalid_input(format!("Cookie expire is not valid: {text}"))),
        }
    }
}

fn parse_expiry(text: &str) -> Option<i64> {
    if let Ok(ts) = text.parse::<i64>() {
        return Some(ts);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    for format in EXPIRY_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// An immutable cookie. Builder methods consume and return the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CookieRecord")]
pub struct Cookie {
    name: String,
    value: Option<String>,
    expire: i64,
    path: String,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
}

/// Serialized cookie fields, validated through `Cookie::new` on the way in.
#[derive(Deserialize)]
struct CookieRecord {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    expire: i64,
    #[serde(default)]
    path: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    secure: bool,
    #[serde(default = "default_http_only")]
    http_only: bool,
}

fn default_http_only() -> bool {
    true
}

impl TryFrom<CookieRecord> for Cookie {
    type Error = Error;

    fn try_from(record: CookieRecord) -> Result<Self> {
        let cookie = Cookie::new(&record.name, record.value.as_deref())?
            .with_path(&record.path)
            .with_secure(record.secure)
            .with_http_only(record.http_only);
        let cookie = match record.domain {
            Some(domain) => cookie.with_domain(&domain),
            None => cookie,
        };
        Ok(Self {
            expire: record.expire,
            ..cookie
        })
    }
}

impl Cookie {
    /// A session cookie on `/`, http-only. The name must not be empty.
    pub fn new(name: &str, value: Option<&str>) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::invalid_input("Cookie name cannot be empty."));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.map(str::to_string),
            expire: 0,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        })
    }

    pub fn with_expire(self, expire: impl Into<Expiry>) -> Result<Self> {
        let expire = expire.into().to_timestamp()?;
        Ok(Self { expire, ..self })
    }

    /// An empty path falls back to `/`.
    pub fn with_path(self, path: &str) -> Self {
        let path = if path.is_empty() { "/" } else { path };
        Self {
            path: path.to_string(),
            ..self
        }
    }

    pub fn with_domain(self, domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..self
        }
    }

    pub fn with_secure(self, secure: bool) -> Self {
        Self { secure, ..self }
    }

    pub fn with_http_only(self, http_only: bool) -> Self {
        Self { http_only, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Unix timestamp; `0` for a session cookie.
    pub fn expire(&self) -> i64 {
        self.expire
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn is_http_only(&self) -> bool {
        self.http_only
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value.as_deref().unwrap_or_default());
        if self.expire != 0 {
            if let Some(dt) = DateTime::<Utc>::from_timestamp(self.expire, 0) {
                out.push_str(&dt.format("; Expires=%a, %d %b %Y %H:%M:%S GMT").to_string());
            }
        }
        out.push_str("; Path=");
        out.push_str(&self.path);
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}
