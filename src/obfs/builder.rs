//! Synthetic HTTP envelopes
//!
//! Pure formatting helpers that wrap an opaque byte stream in a request or
//! response head ending in `Transfer-Encoding: chunked`, so the real payload
//! can follow as the body.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Longest random request path, excluding the leading slash
pub const MAX_PATH_LEN: usize = 48;

const REQUEST_HEADERS: &str = "Accept: */*\r\n\
    Accept-Encoding: */*\r\n\
    Accept-Language: en-US,en;q=0.8\r\n\
    Connection: keep-alive\r\n";

const RESPONSE_HEADERS: &str = "Cache-Control: private, no-store, max-age=0, no-cache\r\n\
    Content-Type: text/html; charset=utf-8\r\n\
    Content-Encoding: gzip\r\n\
    Server: openresty/1.21.4.1\r\n\
    Connection: keep-alive\r\n";

const CHUNKED_TRAILER: &str = "Transfer-Encoding: chunked\r\n\r\n";

/// Random alphanumeric path segment of length `1..=MAX_PATH_LEN`
pub fn random_path<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(1..=MAX_PATH_LEN);
    (0..len)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}

/// Render `(name, value)` pairs as header lines
pub fn format_headers(headers: &[(&str, &str)]) -> String {
    headers
        .iter()
        .map(|(k, v)| format!("{}: {}\r\n", k, v))
        .collect()
}

/// Build a `POST` request head with a random path.
///
/// `headers` must be complete header lines, each ending in CRLF.
pub fn build_request(headers: &str) -> String {
    let path = random_path(&mut rand::thread_rng());
    format!(
        "POST /{} HTTP/1.1\r\n{}{}{}",
        path, REQUEST_HEADERS, headers, CHUNKED_TRAILER
    )
}

/// Build a `200 OK` response head.
///
/// `headers` must be complete header lines, each ending in CRLF.
pub fn build_response(headers: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n{}{}{}",
        RESPONSE_HEADERS, headers, CHUNKED_TRAILER
    )
}
