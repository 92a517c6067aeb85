//! Behavior shared by `Request` and `Response`.
//!
//! # Design
//! Mutators are in-place builder methods: they change the receiver and
//! return `&mut Self` so calls chain. Nothing here clones a message. Header
//! names are case-insensitive on every path (see `Headers`).

use crate::headers::Headers;
use crate::stream::Stream;

pub const DEFAULT_PROTOCOL_VERSION: &str = "1.1";

/// Protocol version, header multimap and body of an HTTP message.
pub trait Message: Sized {
    fn protocol_version(&self) -> &str;

    fn with_protocol_version(&mut self, version: &str) -> &mut Self;

    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    fn body(&self) -> &Stream;

    fn body_mut(&mut self) -> &mut Stream;

    /// Replace the body. The previous stream is closed.
    fn with_body(&mut self, body: Stream) -> &mut Self;

    fn has_header(&self, name: &str) -> bool {
        self.headers().contains(name)
    }

    fn header(&self, name: &str) -> &[String] {
        self.headers().get(name)
    }

    /// All values of `name` joined with `,`.
    fn header_line(&self, name: &str) -> String {
        self.headers().line(name)
    }

    /// Replace `name` with a single value.
    fn with_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers_mut().set(name, [value.into()]);
        self
    }

    /// Replace `name` with several values.
    fn with_header_values<I, V>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.headers_mut().set(name, values);
        self
    }

    /// Append a value to `name`, creating it when absent.
    fn with_added_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers_mut().append(name, [value.into()]);
        self
    }

    fn without_header(&mut self, name: &str) -> &mut Self {
        self.headers_mut().remove(name);
        self
    }
}
