//! Status-coded errors for request handlers.
//!
//! Each kind has a fixed status code and a default message; a custom
//! message and an arbitrary JSON payload can be attached.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusErrorKind {
    BadRequest,
    Unauthorized,
    NotAcceptable,
    NotImplemented,
}

impl StatusErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            StatusErrorKind::BadRequest => 400,
            StatusErrorKind::Unauthorized => 401,
            StatusErrorKind::NotAcceptable => 406,
            StatusErrorKind::NotImplemented => 501,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            StatusErrorKind::BadRequest => "Bad Request",
            StatusErrorKind::Unauthorized => "Unauthorized",
            StatusErrorKind::NotAcceptable => "Not Acceptable",
            StatusErrorKind::NotImplemented => "Not Implemented",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct HttpStatusError {
    kind: StatusErrorKind,
    message: String,
    data: Option<Value>,
}

impl HttpStatusError {
    pub fn new(kind: StatusErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            data: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::new(StatusErrorKind::BadRequest)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusErrorKind::Unauthorized)
    }

    pub fn not_acceptable() -> Self {
        Self::new(StatusErrorKind::NotAcceptable)
    }

    pub fn not_implemented() -> Self {
        Self::new(StatusErrorKind::NotImplemented)
    }

    /// An empty message keeps the default.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = message;
        }
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn set_data(&mut self, data: impl Into<Value>) {
        self.data = Some(data.into());
    }

    pub fn kind(&self) -> StatusErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}
