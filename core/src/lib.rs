//! Synchronous HTTP client core.
//!
//! # Overview
//! A message model (`Uri`, `Stream`, `Request`, `Response`) plus a
//! `Transport` that maps a `Request` onto a blocking transfer engine and
//! assembles the `Response` from the engine's header and body callbacks.
//!
//! ```no_run
//! use courier_core::{Message, Method, Request, Transport, Uri};
//!
//! # fn main() -> courier_core::Result<()> {
//! let mut request = Request::new(Uri::parse("http://localhost:3000/echo")?, Method::Post);
//! request
//!     .with_header("Content-Type", "application/json")
//!     .with_parsed_body(serde_json::json!({"title": "hello"}));
//!
//! let mut transport = Transport::default();
//! let mut response = transport.send(&mut request)?;
//! println!("{} {}", response.status_code(), response.body_mut().contents_string()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `TransferEngine` is the seam to the network. `UreqEngine` is the
//!   default; `ScriptedEngine` replays canned exchanges for tests.
//! - Message mutators work in place and chain (`&mut self -> &mut Self`).
//!   `Uri` mutators are copy-on-write and return a new `Uri`.
//! - 4xx/5xx statuses are ordinary responses; `Error::Transport` is reserved
//!   for failures of the exchange itself.

pub mod cookie;
pub mod engine;
pub mod error;
pub mod headers;
pub mod http;
pub mod message;
pub mod params;
pub mod request;
pub mod response;
pub mod status;
pub mod status_error;
pub mod stream;
pub mod transport;
pub mod upload;
pub mod uri;

pub use cookie::{Cookie, Expiry};
pub use engine::{EngineError, EngineErrorKind, EngineOptions, HttpVersion, PassthroughOptions, TransferEngine, TransferSink};
pub use error::{Error, Result, TransportError, Whence};
pub use headers::Headers;
pub use http::Method;
pub use message::Message;
pub use params::Params;
pub use request::{Environment, Request};
pub use response::Response;
pub use status_error::{HttpStatusError, StatusErrorKind};
pub use stream::{Metadata, Stream};
pub use transport::Transport;
pub use upload::{FileNode, UploadedFile};
pub use uri::Uri;
