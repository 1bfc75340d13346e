//! Incremental HTTP request and reply header parsers
//!
//! Both parsers consume one byte at a time and report when the byte just
//! read terminates the header block. They never allocate beyond the header
//! fields they accumulate and never touch the network.

use crate::error::ParseError;
use std::collections::HashMap;
use std::mem;

/// Largest header block the parsers accept
pub const MAX_HEADER_SIZE: usize = 8192;

/// Longest request method accepted before the separating space
pub const MAX_METHOD_LEN: usize = 8;

/// Request methods accepted on the request line
pub const HTTP_METHODS: [&str; 9] = [
    "GET", "POST", "OPTIONS", "HEAD", "PUT", "DELETE", "CONNECT", "TRACE", "PATCH",
];

/// Check whether `method` is an accepted request method
pub fn is_valid_method(method: &str) -> bool {
    HTTP_METHODS.contains(&method)
}

/// Parsing phase of a header parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Request method
    Method,
    /// Request URI
    Uri,
    /// Version string (last token of a request line, first of a reply line)
    Version,
    /// Reply status code
    StatusCode,
    /// Reply status text
    StatusText,
    /// Header name, or the blank line ending the block
    HeaderKey,
    /// Header value
    HeaderValue,
}

/// Common interface of the request and reply parsers
pub trait HeaderParser {
    /// Feed one byte. Returns `Ok(true)` when it completes the header block.
    fn read(&mut self, byte: u8) -> Result<bool, ParseError>;

    /// Return to the initial state
    fn reset(&mut self);

    /// Feed a slice until the header block completes.
    ///
    /// Returns the offset just past the terminating line feed, or `None` if
    /// more input is needed.
    fn feed(&mut self, data: &[u8]) -> Result<Option<usize>, ParseError> {
        for (i, &byte) in data.iter().enumerate() {
            if self.read(byte)? {
                return Ok(Some(i + 1));
            }
        }
        Ok(None)
    }
}

fn check_byte(byte: u8) -> Result<(), ParseError> {
    if (byte < 0x20 && byte != b'\r' && byte != b'\n') || byte > 0x7e {
        return Err(ParseError::InvalidCharacter(byte));
    }
    Ok(())
}

/// Header lines shared by requests and replies
#[derive(Debug, Clone, Default)]
struct HeaderLines {
    headers: HashMap<String, String>,
    key: String,
    value: String,
}

impl HeaderLines {
    /// Handle a byte in [`Phase::HeaderKey`] or [`Phase::HeaderValue`]
    fn read(&mut self, phase: &mut Phase, byte: u8) -> bool {
        match *phase {
            Phase::HeaderKey => match byte {
                b'\n' => {
                    self.key.clear();
                    self.value.clear();
                    return true;
                }
                b'\r' => {}
                b':' => *phase = Phase::HeaderValue,
                b' ' if self.key.is_empty() => {}
                _ => self.key.push(byte as char),
            },
            Phase::HeaderValue => match byte {
                b'\n' => {
                    let key = mem::take(&mut self.key);
                    let value = mem::take(&mut self.value);
                    self.headers.insert(key, value);
                    *phase = Phase::HeaderKey;
                }
                b'\r' => {}
                b' ' if self.value.is_empty() => {}
                _ => self.value.push(byte as char),
            },
            _ => {}
        }
        false
    }

    fn clear(&mut self) {
        self.headers.clear();
        self.key.clear();
        self.value.clear();
    }

    fn marshal_into(&self, out: &mut String) {
        // Emission order follows the map, not the input
        for (k, v) in &self.headers {
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
    }
}

/// Parser for `METHOD SP URI SP VERSION CRLF (Key: Value CRLF)* CRLF`
#[derive(Debug, Clone)]
pub struct RequestParser {
    phase: Phase,
    method: String,
    uri: String,
    version: String,
    lines: HeaderLines,
    raw: Vec<u8>,
    complete: bool,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    /// Create a parser awaiting a request line
    pub fn new() -> Self {
        RequestParser {
            phase: Phase::Method,
            method: String::new(),
            uri: String::new(),
            version: String::new(),
            lines: HeaderLines::default(),
            raw: Vec::new(),
            complete: false,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Request method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// HTTP version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parsed headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.lines.headers
    }

    /// Look up a header by exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.lines.headers.get(name).map(String::as_str)
    }

    /// Header bytes accepted so far, verbatim
    pub fn raw_header(&self) -> &[u8] {
        &self.raw
    }

    /// Number of header bytes accepted so far
    pub fn consumed(&self) -> usize {
        self.raw.len()
    }

    /// Whether the header block has been terminated
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// `METHOD URI VERSION`
    pub fn first_line(&self) -> String {
        format!("{} {} {}", self.method, self.uri, self.version)
    }

    /// Re-serialize the request head. Header order is unspecified.
    pub fn marshal(&self) -> String {
        let mut out = self.first_line();
        out.push_str("\r\n");
        self.lines.marshal_into(&mut out);
        out
    }
}

impl HeaderParser for RequestParser {
    fn read(&mut self, byte: u8) -> Result<bool, ParseError> {
        check_byte(byte)?;
        if self.raw.len() >= MAX_HEADER_SIZE {
            return Err(ParseError::HeaderTooLarge(MAX_HEADER_SIZE));
        }
        self.raw.push(byte);

        match self.phase {
            Phase::Method => {
                if byte == b' ' {
                    if !is_valid_method(&self.method) {
                        return Err(ParseError::InvalidMethod(self.method.clone()));
                    }
                    self.phase = Phase::Uri;
                } else {
                    if self.method.len() >= MAX_METHOD_LEN {
                        return Err(ParseError::MethodTooLong);
                    }
                    self.method.push(byte as char);
                }
            }
            Phase::Uri => {
                if byte == b' ' {
                    if self.uri.is_empty() {
                        return Err(ParseError::MissingUri);
                    }
                    self.phase = Phase::Version;
                } else {
                    self.uri.push(byte as char);
                }
            }
            Phase::Version => match byte {
                b'\n' => {
                    if self.version.is_empty() {
                        return Err(ParseError::MissingVersion);
                    }
                    self.phase = Phase::HeaderKey;
                }
                b'\r' => {}
                _ => self.version.push(byte as char),
            },
            Phase::HeaderKey | Phase::HeaderValue => {
                if self.lines.read(&mut self.phase, byte) {
                    self.complete = true;
                    return Ok(true);
                }
            }
            Phase::StatusCode | Phase::StatusText => {
                unreachable!("request parser never enters reply phases")
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.phase = Phase::Method;
        self.method.clear();
        self.uri.clear();
        self.version.clear();
        self.lines.clear();
        self.raw.clear();
        self.complete = false;
    }
}

/// Parser for `VERSION SP CODE SP TEXT CRLF (Key: Value CRLF)* CRLF`
#[derive(Debug, Clone)]
pub struct ReplyParser {
    phase: Phase,
    version: String,
    status_code: u16,
    status_text: String,
    lines: HeaderLines,
    consumed: usize,
    complete: bool,
}

impl Default for ReplyParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyParser {
    /// Create a parser awaiting a status line
    pub fn new() -> Self {
        ReplyParser {
            phase: Phase::Version,
            version: String::new(),
            status_code: 0,
            status_text: String::new(),
            lines: HeaderLines::default(),
            consumed: 0,
            complete: false,
        }
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// HTTP version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Status code, `0` until parsed
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Status text
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Parsed headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.lines.headers
    }

    /// Look up a header by exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.lines.headers.get(name).map(String::as_str)
    }

    /// Number of header bytes accepted so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Whether the header block has been terminated
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// `VERSION CODE TEXT`
    pub fn first_line(&self) -> String {
        format!("{} {} {}", self.version, self.status_code, self.status_text)
    }

    /// Re-serialize the reply head. Header order is unspecified.
    pub fn marshal(&self) -> String {
        let mut out = self.first_line();
        out.push_str("\r\n");
        self.lines.marshal_into(&mut out);
        out
    }
}

impl HeaderParser for ReplyParser {
    fn read(&mut self, byte: u8) -> Result<bool, ParseError> {
        check_byte(byte)?;
        if self.consumed >= MAX_HEADER_SIZE {
            return Err(ParseError::HeaderTooLarge(MAX_HEADER_SIZE));
        }
        self.consumed += 1;

        match self.phase {
            Phase::Version => {
                if byte == b' ' {
                    if !self.version.starts_with("HTTP") {
                        return Err(ParseError::InvalidVersion(self.version.clone()));
                    }
                    self.phase = Phase::StatusCode;
                } else {
                    self.version.push(byte as char);
                    if self.version.len() == 4 && self.version != "HTTP" {
                        return Err(ParseError::InvalidVersion(self.version.clone()));
                    }
                }
            }
            Phase::StatusCode => match byte {
                b' ' => {
                    if self.status_text.is_empty() {
                        return Err(ParseError::MissingStatusCode);
                    }
                    // Digits are accumulated in the text buffer until parsed
                    self.status_code = self
                        .status_text
                        .parse()
                        .map_err(|_| ParseError::BadStatusCode)?;
                    self.status_text.clear();
                    self.phase = Phase::StatusText;
                }
                b'0'..=b'9' => self.status_text.push(byte as char),
                _ => return Err(ParseError::BadStatusCode),
            },
            Phase::StatusText => match byte {
                b'\n' => {
                    if self.status_text.is_empty() {
                        return Err(ParseError::MissingStatusText);
                    }
                    self.phase = Phase::HeaderKey;
                }
                b'\r' => {}
                _ => self.status_text.push(byte as char),
            },
            Phase::HeaderKey | Phase::HeaderValue => {
                if self.lines.read(&mut self.phase, byte) {
                    self.complete = true;
                    return Ok(true);
                }
            }
            Phase::Method | Phase::Uri => {
                unreachable!("reply parser never enters request phases")
            }
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.phase = Phase::Version;
        self.version.clear();
        self.status_code = 0;
        self.status_text.clear();
        self.lines.clear();
        self.consumed = 0;
        self.complete = false;
    }
}
