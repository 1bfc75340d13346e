//! Error types for Camorelay
//!
//! This module defines the error taxonomy of the relay core and of the
//! HTTP camouflage codec.

use std::io;
use thiserror::Error;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// The listener or socket could not be bound. Fatal for the server.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed; ends that harness's loop
    #[error("Accept error: {0}")]
    Accept(#[source] io::Error),

    /// A UDP session could not be created; the packet is dropped
    #[error("Session creation failed: {0}")]
    SessionCreate(String),

    /// Reading from a remote connection failed; tears down that flow
    #[error("Relay read error: {0}")]
    RelayRead(#[source] io::Error),

    /// HTTP camouflage parse error
    #[error("HTTP parse error: {0}")]
    Parse(#[from] ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors reported by the HTTP request/reply parsers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Control byte (other than CR/LF) or byte above 0x7E
    #[error("Invalid character: {0:#04x}")]
    InvalidCharacter(u8),

    /// Request method outside the accepted set
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Request method longer than any accepted method
    #[error("Method is too long")]
    MethodTooLong,

    /// Request line without a URI
    #[error("No URI")]
    MissingUri,

    /// Request line without a version string
    #[error("No HTTP version string")]
    MissingVersion,

    /// Reply version token does not start with `HTTP`
    #[error("Invalid HTTP response version: {0}")]
    InvalidVersion(String),

    /// Reply line without a status code
    #[error("No reply status code")]
    MissingStatusCode,

    /// Status code contains non-digits or does not fit
    #[error("Bad reply status code")]
    BadStatusCode,

    /// Reply line without a status text
    #[error("No reply status string")]
    MissingStatusText,

    /// Header block grew beyond the accepted size
    #[error("Header block exceeds {0} bytes")]
    HeaderTooLarge(usize),
}

impl RelayError {
    /// Whether this error should stop the whole process
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Bind { .. })
    }
}
