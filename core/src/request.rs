//! Outgoing or incoming HTTP request.
//!
//! # Design
//! Besides method, URI, headers and body, a `Request` carries read-mostly
//! views taken from an environment snapshot: query params, posted form
//! params, the uploaded-file tree, server params and cookies. An open
//! attribute bag holds metadata added by later processing stages.
//!
//! All `with_*` methods mutate in place and return `&mut Self`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::http::Method;
use crate::message::{Message, DEFAULT_PROTOCOL_VERSION};
use crate::params::{self, Params};
use crate::stream::Stream;
use crate::upload::{self, FileNode, UploadedFile};
use crate::uri::Uri;

/// Snapshot of the runtime environment a request was received in.
///
/// `files` holds raw five-field upload records (possibly nested);
/// `cookies` maps cookie names to their values.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub query: Params,
    pub post: Params,
    pub files: Params,
    pub server: Params,
    pub cookies: Params,
}

#[derive(Debug)]
pub struct Request {
    version: String,
    method: Method,
    uri: Uri,
    headers: Headers,
    body: Stream,
    query: Params,
    post: Params,
    files: BTreeMap<String, FileNode>,
    server: Params,
    cookies: BTreeMap<String, Cookie>,
    attributes: Params,
    parsed_body: Option<Value>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Uri::default(), Method::Get)
    }
}

impl Request {
    pub fn new(uri: Uri, method: Method) -> Self {
        Self {
            version: DEFAULT_PROTOCOL_VERSION.to_string(),
            method,
            uri,
            headers: Headers::new(),
            body: Stream::memory(),
            query: Params::new(),
            post: Params::new(),
            files: BTreeMap::new(),
            server: Params::new(),
            cookies: BTreeMap::new(),
            attributes: Params::new(),
            parsed_body: None,
        }
    }

    /// Build a request from caller-supplied parts plus an environment
    /// snapshot. Headers derived from `HTTP_*` server params fill in names
    /// the caller did not set.
    pub fn from_environment(
        uri: Uri,
        method: Method,
        headers: Headers,
        attributes: Params,
        env: Environment,
    ) -> Result<Self> {
        let mut request = Self::new(uri, method);
        request.headers = headers;
        for (name, values) in parse_headers(&env.server).iter() {
            if !request.headers.contains(name) {
                request.headers.set(name, values.iter().cloned());
            }
        }
        request.files = upload::parse_files(&env.files)?;
        request.cookies = parse_cookies(&env.cookies)?;
        request.query = env.query;
        request.post = env.post;
        request.server = env.server;
        request.attributes = attributes;
        Ok(request)
    }

    /// Build a request the way a CGI-style server describes it: URL from
    /// `HTTPS`, `SERVER_NAME`, `SERVER_PORT` and `REQUEST_URI`, method from
    /// `REQUEST_METHOD`, version from `SERVER_PROTOCOL`.
    pub fn from_globals(env: Environment, attributes: Params) -> Result<Self> {
        let server = &env.server;
        let secure = server_str(server, "HTTPS").is_some_and(|v| !v.is_empty() && v != "off");
        let scheme = if secure { "https" } else { "http" };
        let host = server_str(server, "SERVER_NAME").unwrap_or_else(|| "localhost".to_string());
        let port = server_str(server, "SERVER_PORT")
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        let target = server_str(server, "REQUEST_URI").unwrap_or_else(|| "/".to_string());
        let uri = Uri::parse(&format!("{scheme}://{host}{port}{target}"))?;

        let method = match server_str(server, "REQUEST_METHOD") {
            Some(m) => m.parse()?,
            None => Method::Get,
        };
        let version = server_str(server, "SERVER_PROTOCOL")
            .and_then(|p| p.strip_prefix("HTTP/").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());

        let mut request = Self::from_environment(uri, method, Headers::new(), attributes, env)?;
        request.version = version;
        Ok(request)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn with_method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Replace the URI. Without `preserve_host` the `Host` header is set
    /// from the new URI. With it, an existing `Host` is kept and a missing
    /// one is filled in from the URI.
    pub fn with_uri(&mut self, uri: Uri, preserve_host: bool) -> &mut Self {
        if !preserve_host || self.header_line("host").is_empty() {
            let host = match uri.port() {
                Some(port) => format!("{}:{port}", uri.host()),
                None => uri.host().to_string(),
            };
            self.headers.set("Host", [host]);
        }
        self.uri = uri;
        self
    }

    pub fn query_params(&self) -> &Params {
        &self.query
    }

    /// Replace the query view and rewrite the URI query to match.
    pub fn with_query_params(&mut self, query: Params) -> &mut Self {
        self.uri = self.uri.with_query_params(&query);
        self.query = query;
        self
    }

    pub fn query(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    pub fn query_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.query.get(name).cloned().unwrap_or_else(|| default.into())
    }

    pub fn has_query(&self, name: &str) -> bool {
        self.query.contains_key(name)
    }

    pub fn post_params(&self) -> &Params {
        &self.post
    }

    pub fn post(&self, name: &str) -> Option<&Value> {
        self.post.get(name)
    }

    pub fn post_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.post.get(name).cloned().unwrap_or_else(|| default.into())
    }

    pub fn has_post(&self, name: &str) -> bool {
        self.post.contains_key(name)
    }

    pub fn uploaded_files(&self) -> &BTreeMap<String, FileNode> {
        &self.files
    }

    /// Add or replace uploads from raw five-field records.
    pub fn with_uploaded_files(&mut self, files: &Params) -> Result<&mut Self> {
        let parsed = upload::parse_files(files)?;
        self.files.extend(parsed);
        Ok(self)
    }

    pub fn file(&self, name: &str) -> Option<&FileNode> {
        self.files.get(name)
    }

    /// The upload stored under `name`, or an empty record.
    pub fn file_or_empty(&self, name: &str) -> UploadedFile {
        match self.files.get(name) {
            Some(FileNode::File(file)) => file.clone(),
            _ => UploadedFile::default(),
        }
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn server_params(&self) -> &Params {
        &self.server
    }

    pub fn server(&self, name: &str) -> Option<&Value> {
        self.server.get(name)
    }

    pub fn server_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.server.get(name).cloned().unwrap_or_else(|| default.into())
    }

    pub fn cookie_params(&self) -> &BTreeMap<String, Cookie> {
        &self.cookies
    }

    pub fn with_cookie_params(&mut self, cookies: BTreeMap<String, Cookie>) -> &mut Self {
        self.cookies = cookies;
        self
    }

    pub fn attributes(&self) -> &Params {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_or(&self, name: &str, default: impl Into<Value>) -> Value {
        self.attributes.get(name).cloned().unwrap_or_else(|| default.into())
    }

    pub fn with_attribute(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn without_attribute(&mut self, name: &str) -> &mut Self {
        self.attributes.remove(name);
        self
    }

    /// The payload the transport encodes: an explicitly set parsed body,
    /// else the post params of a POST request.
    pub fn parsed_body(&self) -> Option<Value> {
        if let Some(body) = &self.parsed_body {
            return Some(body.clone());
        }
        if self.method == Method::Post && !self.post.is_empty() {
            return Some(Value::Object(self.post.clone()));
        }
        None
    }

    pub fn with_parsed_body(&mut self, body: impl Into<Value>) -> &mut Self {
        self.parsed_body = Some(body.into());
        self
    }

    /// Decode the body stream according to `content-type`: JSON to a value,
    /// form encoding to a param map, anything else to a one-item list
    /// holding the raw text.
    pub fn input_params(&mut self) -> Result<Value> {
        let input = self.body.to_string_lossy();
        match self.media_type().as_deref() {
            Some("application/json") => serde_json::from_str(&input)
                .map_err(|e| Error::invalid_input(format!("invalid JSON body: {e}"))),
            Some("application/x-www-form-urlencoded") => Ok(Value::Object(params::parse_query(&input))),
            _ => Ok(Value::Array(vec![Value::String(input)])),
        }
    }

    pub fn has_input(&mut self, name: &str) -> Result<bool> {
        Ok(match self.input_params()? {
            Value::Object(map) => map.contains_key(name),
            _ => false,
        })
    }

    /// Lowercase media type of the first `content-type` value, without parameters.
    fn media_type(&self) -> Option<String> {
        self.headers
            .get("content-type")
            .first()
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::Head
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::Get
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::Post
    }

    pub fn is_put(&self) -> bool {
        self.method == Method::Put
    }

    pub fn is_patch(&self) -> bool {
        self.method == Method::Patch
    }

    pub fn is_delete(&self) -> bool {
        self.method == Method::Delete
    }

    pub fn is_purge(&self) -> bool {
        self.method == Method::Purge
    }

    pub fn is_options(&self) -> bool {
        self.method == Method::Options
    }

    pub fn is_trace(&self) -> bool {
        self.method == Method::Trace
    }

    pub fn is_connect(&self) -> bool {
        self.method == Method::Connect
    }

    /// `X-Requested-With: XMLHttpRequest`, compared case-insensitively.
    pub fn is_ajax(&self) -> bool {
        self.headers.line("X-Requested-With").eq_ignore_ascii_case("xmlhttprequest")
    }

    pub fn is_secure(&self) -> bool {
        self.uri.scheme() == "https"
    }

    /// First of `HTTP_X_FORWARDED_FOR`, `HTTP_X_REAL_IP`, `REMOTE_ADDR`.
    pub fn client_ip(&self) -> Option<String> {
        ["HTTP_X_FORWARDED_FOR", "HTTP_X_REAL_IP", "REMOTE_ADDR"]
            .into_iter()
            .find_map(|key| server_str(&self.server, key))
    }

    pub fn client_user_agent(&self) -> Option<String> {
        server_str(&self.server, "HTTP_USER_AGENT")
    }
}

impl Message for Request {
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

fn server_str(server: &Params, key: &str) -> Option<String> {
    server.get(key).and_then(params::scalar_to_string)
}

/// Derive headers from `HTTP_*` server params: `HTTP_CACHE_CONTROL: a,b`
/// becomes `cache-control: [a, b]`.
pub fn parse_headers(server: &Params) -> Headers {
    let mut headers = Headers::new();
    for (key, value) in server {
        let Some(name) = key.strip_prefix("HTTP_") else { continue };
        let Some(value) = params::scalar_to_string(value) else { continue };
        let name = name.to_ascii_lowercase().replace('_', "-");
        headers.set(&name, value.split(',').map(str::to_string));
    }
    headers
}

/// Build request cookies from a name → value map.
pub fn parse_cookies(cookies: &Params) -> Result<BTreeMap<String, Cookie>> {
    cookies
        .iter()
        .map(|(name, value)| {
            let value = params::scalar_to_string(value);
            Ok((name.clone(), Cookie::new(name, value.as_deref())?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn derives_headers_from_server_params() {
        let headers = parse_headers(&params(json!({
            "SERVER_PROTOCOL": "HTTP/1.1",
            "HTTP_HOST": "domain.com",
            "HTTP_CACHE_CONTROL": "no-cache",
            "HTTP_ACCEPT": "text/html,application/xhtml+xml,*/*;q=0.8",
            "HTTP_UPGRADE_INSECURE_REQUESTS": 1
        })));

        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("Host"), ["domain.com"]);
        assert_eq!(headers.get("Cache-Control"), ["no-cache"]);
        assert_eq!(headers.get("accept"), ["text/html", "application/xhtml+xml", "*/*;q=0.8"]);
        assert_eq!(headers.get("Upgrade-Insecure-Requests"), ["1"]);
        assert!(!headers.contains("server-protocol"));
    }

    #[test]
    fn protocol_version() {
        let mut request = Request::default();
        assert_eq!(request.protocol_version(), "1.1");
        assert_eq!(request.with_protocol_version("2.0").protocol_version(), "2.0");
    }

    #[test]
    fn headers() {
        let mut request = Request::default();
        request
            .with_header("Host", "domain.com")
            .with_header_values("Accept", ["text/html", "application/xml;q=0.9"]);

        assert_eq!(request.header("Host"), ["domain.com"]);
        assert_eq!(request.header_line("accept"), "text/html,application/xml;q=0.9");

        request.with_header("host", "new-domain.com");
        assert_eq!(request.header("Host"), ["new-domain.com"]);
        assert!(request.has_header("HOST"));

        request.with_added_header("Accept", "image/png");
        assert_eq!(request.header("Accept"), ["text/html", "application/xml;q=0.9", "image/png"]);

        request.with_added_header("Test", "yes");
        assert_eq!(request.header("test"), ["yes"]);
        request.without_header("TEST");
        assert!(!request.has_header("Test"));
    }

    #[test]
    fn body() {
        let mut request = Request::default();
        let mut stream = Stream::memory();
        stream.write(b"test").unwrap();
        stream.rewind().unwrap();

        request.with_body(stream);
        assert_eq!(request.body_mut().contents().unwrap(), b"test");
    }

    #[test]
    fn method_and_uri() {
        let mut request = Request::default();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.with_method(Method::Post).method(), Method::Post);
        assert_eq!(request.uri().path(), "/");

        request.with_uri(Uri::parse("http://dev.com/test").unwrap(), false);
        assert_eq!(request.uri().host(), "dev.com");
        assert_eq!(request.header("Host"), ["dev.com"]);

        request.with_uri(Uri::parse("http://dev2.com").unwrap(), true);
        assert_eq!(request.uri().host(), "dev2.com");
        assert_eq!(request.header("Host"), ["dev.com"]);

        request.without_header("host");
        request.with_uri(Uri::parse("http://dev3.com:8080").unwrap(), true);
        assert_eq!(request.header("Host"), ["dev3.com:8080"]);

        request.with_uri(Uri::parse("http://dev4.com:8080").unwrap(), false);
        assert_eq!(request.header("Host"), ["dev4.com:8080"]);
    }

    #[test]
    fn environment_views() {
        let env = Environment {
            server: params(json!({"Host": "domain.com"})),
            query: params(json!({"q": "search"})),
            post: params(json!({"foo": "bar"})),
            files: params(json!({"file": {
                "tmp_name": "php543jd", "name": "file.png", "size": 20, "type": "image/png", "error": 0
            }})),
            cookies: params(json!({"sid": "abc"})),
        };
        let mut request =
            Request::from_environment(Uri::default(), Method::Get, Headers::new(), Params::new(), env).unwrap();

        assert_eq!(request.server_params(), &params(json!({"Host": "domain.com"})));
        assert_eq!(request.query_params(), &params(json!({"q": "search"})));
        assert_eq!(request.post_params(), &params(json!({"foo": "bar"})));
        assert_eq!(request.query("q"), Some(&json!("search")));
        assert_eq!(request.post_or("foo", "none"), json!("bar"));
        assert_eq!(request.post_or("missing", "none"), json!("none"));
        assert_eq!(request.server_or("nope", 7), json!(7));
        assert!(request.has_query("q"));
        assert!(!request.has_post("q"));
        assert_eq!(request.cookie_params()["sid"].value(), Some("abc"));

        assert_eq!(request.file_or_empty("file").client_filename(), Some("file.png"));
        assert!(request.has_file("file"));
        assert_eq!(request.file_or_empty("nope"), UploadedFile::default());

        request
            .with_uploaded_files(&params(json!({"file": {
                "tmp_name": "php543jd", "name": "file.png", "size": 30, "type": "image/png", "error": 0
            }})))
            .unwrap();
        assert_eq!(request.file_or_empty("file").size(), Some(30));
        assert_eq!(request.file_or_empty("file").client_media_type(), Some("image/png"));
    }

    #[test]
    fn caller_headers_win_over_derived_ones() {
        let env = Environment {
            server: params(json!({"HTTP_HOST": "derived.com", "HTTP_ACCEPT": "*/*"})),
            ..Environment::default()
        };
        let headers: Headers = [("Host", "explicit.com")].into_iter().collect();
        let request = Request::from_environment(Uri::default(), Method::Get, headers, Params::new(), env).unwrap();
        assert_eq!(request.header("host"), ["explicit.com"]);
        assert_eq!(request.header("accept"), ["*/*"]);
    }

    #[test]
    fn from_globals_builds_uri_method_and_version() {
        let env = Environment {
            server: params(json!({
                "HTTPS": "on",
                "SERVER_NAME": "shop.example.com",
                "SERVER_PORT": 8443,
                "REQUEST_URI": "/cart/items?page=2",
                "REQUEST_METHOD": "PUT",
                "SERVER_PROTOCOL": "HTTP/2.0",
                "REMOTE_ADDR": "10.0.0.7",
                "HTTP_USER_AGENT": "curl/8.0"
            })),
            ..Environment::default()
        };
        let request = Request::from_globals(env, Params::new()).unwrap();
        assert_eq!(request.uri().to_string(), "https://shop.example.com:8443/cart/items?page=2");
        assert_eq!(request.method(), Method::Put);
        assert_eq!(request.protocol_version(), "2.0");
        assert!(request.is_secure());
        assert_eq!(request.client_ip().as_deref(), Some("10.0.0.7"));
        assert_eq!(request.client_user_agent().as_deref(), Some("curl/8.0"));
        assert_eq!(request.header("user-agent"), ["curl/8.0"]);
    }

    #[test]
    fn from_globals_rejects_unknown_method() {
        let env = Environment {
            server: params(json!({"REQUEST_METHOD": "BREW"})),
            ..Environment::default()
        };
        assert!(matches!(Request::from_globals(env, Params::new()), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn method_predicates() {
        let request = Request::default();
        assert!(request.is_get());
        assert!(!request.is_post());
        assert!(!request.is_put());
        assert!(!request.is_patch());
        assert!(!request.is_head());
        assert!(!request.is_options());
        assert!(!request.is_delete());
        assert!(!request.is_ajax());
        assert!(!request.is_secure());
        assert!(!request.is_purge());
        assert!(!request.is_trace());
        assert!(!request.is_connect());

        let mut ajax = Request::default();
        ajax.with_header("X-Requested-With", "XMLHttpRequest");
        assert!(ajax.is_ajax());
    }

    #[test]
    fn attributes() {
        let mut request = Request::default();
        request.with_attribute("foo", "bar");
        assert_eq!(request.attributes(), &params(json!({"foo": "bar"})));
        assert_eq!(request.attribute("foo"), Some(&json!("bar")));
        assert_eq!(request.with_attribute("foo", "baz").attribute("foo"), Some(&json!("baz")));
        assert_eq!(request.without_attribute("foo").attribute_or("foo", "baa"), json!("baa"));
    }

    #[test]
    fn query_params_rewrite_uri() {
        let mut request = Request::new(Uri::parse("http://dev.ro/s?old=1").unwrap(), Method::Get);
        request.with_query_params(params(json!({"q": "search"})));
        assert_eq!(request.query("q"), Some(&json!("search")));
        assert_eq!(request.uri().query(), "q=search");
    }

    #[test]
    fn parsed_body_sources() {
        let env = Environment {
            post: params(json!({"a": "1"})),
            ..Environment::default()
        };
        let mut request =
            Request::from_environment(Uri::default(), Method::Post, Headers::new(), Params::new(), env).unwrap();
        assert_eq!(request.parsed_body(), Some(json!({"a": "1"})));

        request.with_method(Method::Put);
        assert_eq!(request.parsed_body(), None);

        request.with_parsed_body(json!({"b": 2}));
        assert_eq!(request.parsed_body(), Some(json!({"b": 2})));
    }

    #[test]
    fn input_params_by_content_type() {
        let mut request = Request::default();
        request
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(Stream::from_bytes(r#"{"title":"x"}"#));
        assert_eq!(request.input_params().unwrap(), json!({"title": "x"}));
        assert!(request.has_input("title").unwrap());

        request
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(Stream::from_bytes("a=1&b[]=2"));
        assert_eq!(request.input_params().unwrap(), json!({"a": "1", "b": ["2"]}));

        request.with_header("Content-Type", "text/plain").with_body(Stream::from_bytes("raw"));
        assert_eq!(request.input_params().unwrap(), json!(["raw"]));
        assert!(!request.has_input("raw").unwrap());

        request
            .with_header("Content-Type", "application/json")
            .with_body(Stream::from_bytes("{oops"));
        assert!(matches!(request.input_params(), Err(Error::InvalidInput { .. })));
    }
}
