//! HTTP camouflage envelopes as seen by the public API

use camorelay::error::ParseError;
use camorelay::obfs::{
    build_request, build_response, format_headers, HeaderParser, Phase, ReplyParser,
    RequestParser, MAX_PATH_LEN,
};
use std::collections::HashMap;

#[test]
fn test_request_envelope_parses() {
    let headers = format_headers(&[("Host", "cdn.example.com")]);
    let request = build_request(&headers);

    let mut parser = RequestParser::new();
    let consumed = parser.feed(request.as_bytes()).unwrap();
    assert_eq!(consumed, Some(request.len()));
    assert_eq!(parser.method(), "POST");
    assert_eq!(parser.version(), "HTTP/1.1");
    assert_eq!(parser.phase(), Phase::HeaderKey);

    let path = parser.uri().strip_prefix('/').unwrap();
    assert!((1..=MAX_PATH_LEN).contains(&path.len()));
    assert!(path.chars().all(|c| c.is_ascii_alphanumeric()));

    let expected: HashMap<String, String> = [
        ("Accept", "*/*"),
        ("Accept-Encoding", "*/*"),
        ("Accept-Language", "en-US,en;q=0.8"),
        ("Connection", "keep-alive"),
        ("Host", "cdn.example.com"),
        ("Transfer-Encoding", "chunked"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(parser.headers(), &expected);
}

#[test]
fn test_response_envelope_parses() {
    let response = build_response("");
    let mut parser = ReplyParser::new();
    assert_eq!(parser.feed(response.as_bytes()).unwrap(), Some(response.len()));
    assert_eq!(parser.status_code(), 200);
    assert_eq!(parser.status_text(), "OK");
    assert_eq!(parser.header("Server"), Some("openresty/1.21.4.1"));
}

#[test]
fn test_payload_after_head_is_not_consumed() {
    let mut wire = build_request("").into_bytes();
    let head_len = wire.len();
    wire.extend_from_slice(b"\x00\x01payload");

    let mut parser = RequestParser::new();
    assert_eq!(parser.feed(&wire).unwrap(), Some(head_len));
    assert_eq!(&wire[head_len..], b"\x00\x01payload");
}

#[test]
fn test_binary_garbage_rejected() {
    let mut parser = RequestParser::new();
    assert_eq!(
        parser.feed(&[0x16, 0x03, 0x01, 0x00]),
        Err(ParseError::InvalidCharacter(0x16))
    );

    let mut parser = ReplyParser::new();
    assert_eq!(
        parser.feed(b"SSH-2.0-OpenSSH\r\n"),
        Err(ParseError::InvalidVersion("SSH-".to_string()))
    );
}
