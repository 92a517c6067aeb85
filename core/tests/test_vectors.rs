//! Verify the transport against JSON test vectors stored in `test-vectors/`.
//!
//! `exchanges.json` pairs raw engine output with the response it must
//! produce; `options.json` pairs requests with the engine options derived
//! from them. Header maps are compared by name, not by position.

use courier_core::engine::ScriptedEngine;
use courier_core::transport::{engine_options, http_version};
use courier_core::{Message, Method, Request, Transport, Uri};
use serde_json::Value;

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn opt_str(value: &Value) -> Option<&str> {
    value.as_str()
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

#[test]
fn exchange_test_vectors() {
    let raw = include_str!("../../test-vectors/exchanges.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];

        let engine = ScriptedEngine::new().reply(strings(&case["headers"]), strings(&case["chunks"]));
        let mut transport = Transport::new(engine);
        let mut request = Request::new(Uri::parse("http://vectors.test/").unwrap(), Method::Get);
        let mut response = transport
            .send(&mut request)
            .unwrap_or_else(|e| panic!("{name}: send failed: {e}"));

        assert_eq!(
            u64::from(response.status_code()),
            expected["status"].as_u64().unwrap(),
            "{name}: status"
        );
        assert_eq!(response.reason_phrase(), expected["reason"].as_str().unwrap(), "{name}: reason");
        assert_eq!(response.protocol_version(), expected["version"].as_str().unwrap(), "{name}: version");

        let expected_headers = expected["headers"].as_object().unwrap();
        assert_eq!(response.headers().len(), expected_headers.len(), "{name}: header count");
        for (header, values) in expected_headers {
            assert_eq!(response.header(header), strings(values).as_slice(), "{name}: header {header}");
        }

        assert_eq!(
            response.body_mut().contents_string().unwrap(),
            expected["body"].as_str().unwrap(),
            "{name}: body"
        );
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

fn build_request(input: &Value) -> Request {
    let method: Method = input["method"].as_str().unwrap().parse().unwrap();
    let mut request = Request::new(Uri::parse(input["url"].as_str().unwrap()).unwrap(), method);
    if let Some(version) = input["version"].as_str() {
        request.with_protocol_version(version);
    }
    for pair in input["headers"].as_array().unwrap() {
        request.with_added_header(pair[0].as_str().unwrap(), pair[1].as_str().unwrap());
    }
    if let Some(body) = input.get("parsed_body") {
        request.with_parsed_body(body.clone());
    }
    request
}

#[test]
fn options_test_vectors() {
    let raw = include_str!("../../test-vectors/options.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let expected = &case["expected"];
        let mut request = build_request(&case["request"]);

        let options = engine_options(&mut request).unwrap_or_else(|e| panic!("{name}: {e}"));

        assert_eq!(options.url.as_deref(), opt_str(&expected["url"]), "{name}: url");
        assert_eq!(
            options.http_version,
            Some(http_version(expected["http_version"].as_str().unwrap()).unwrap()),
            "{name}: http_version"
        );
        assert_eq!(options.no_body, expected["no_body"].as_bool(), "{name}: no_body");
        assert_eq!(
            options.custom_request.as_deref(),
            opt_str(&expected["custom_request"]),
            "{name}: custom_request"
        );
        assert_eq!(
            options.post_fields.as_deref(),
            opt_str(&expected["post_fields"]).map(str::as_bytes),
            "{name}: post_fields"
        );
        assert_eq!(
            options.http_header.unwrap(),
            strings(&expected["http_header"]),
            "{name}: http_header"
        );
        assert_eq!(options.user_pwd.as_deref(), opt_str(&expected["user_pwd"]), "{name}: user_pwd");
    }
}
