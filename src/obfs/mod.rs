//! HTTP camouflage codec
//!
//! Makes relayed traffic look like ordinary HTTP/1.1: incremental parsers
//! for request and reply heads, builders for synthetic envelopes, and the
//! async handshakes the TCP tunnel uses to exchange them.
//!
//! ```text
//! client ── POST /<random> ... chunked ──▶ server
//! client ◀── 200 OK ... chunked ───────── server
//! client ◀══════ opaque byte stream ═════▶ server
//! ```

mod builder;
mod handshake;
mod parser;

pub use builder::{build_request, build_response, format_headers, random_path, MAX_PATH_LEN};
pub use handshake::{read_reply, read_request, write_request, write_response};
pub use parser::{
    is_valid_method, HeaderParser, Phase, ReplyParser, RequestParser, HTTP_METHODS,
    MAX_HEADER_SIZE, MAX_METHOD_LEN,
};
