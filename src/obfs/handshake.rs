//! HTTP camouflage handshakes over async streams
//!
//! The reading side feeds whatever arrives into a parser and stops at the
//! end of the header block. Bytes read past the terminator belong to the
//! opaque body and are handed back to the caller.

use super::{build_request, build_response, format_headers, HeaderParser, ReplyParser, RequestParser};
use crate::error::RelayError;
use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Initial read buffer size for header blocks
const HEAD_BUFFER_SIZE: usize = 1024;

/// Send a request envelope, optionally carrying a `Host` header
pub async fn write_request<W>(writer: &mut W, host: Option<&str>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let extra = match host {
        Some(host) => format_headers(&[("Host", host)]),
        None => String::new(),
    };
    let head = build_request(&extra);
    trace!("Sending HTTP request envelope ({} bytes)", head.len());
    writer.write_all(head.as_bytes()).await?;
    writer.flush().await
}

/// Send a response envelope
pub async fn write_response<W>(writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = build_response("");
    trace!("Sending HTTP response envelope ({} bytes)", head.len());
    writer.write_all(head.as_bytes()).await?;
    writer.flush().await
}

/// Read a request head. Returns the parser and any body bytes already read.
pub async fn read_request<R>(reader: &mut R) -> Result<(RequestParser, Bytes), RelayError>
where
    R: AsyncRead + Unpin,
{
    read_head(reader, RequestParser::new()).await
}

/// Read a reply head. Returns the parser and any body bytes already read.
pub async fn read_reply<R>(reader: &mut R) -> Result<(ReplyParser, Bytes), RelayError>
where
    R: AsyncRead + Unpin,
{
    read_head(reader, ReplyParser::new()).await
}

async fn read_head<P, R>(reader: &mut R, mut parser: P) -> Result<(P, Bytes), RelayError>
where
    P: HeaderParser,
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(HEAD_BUFFER_SIZE);
    loop {
        let start = buf.len();
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed before the HTTP header completed",
            )
            .into());
        }
        if let Some(offset) = parser.feed(&buf[start..])? {
            let leftover = buf.split_off(start + offset).freeze();
            return Ok((parser, leftover));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_request_handshake() {
        let (mut client, mut server) = duplex(4096);

        write_request(&mut client, Some("example.com")).await.unwrap();
        client.write_all(b"payload").await.unwrap();

        let (parser, leftover) = read_request(&mut server).await.unwrap();
        assert_eq!(parser.method(), "POST");
        assert_eq!(parser.header("Host"), Some("example.com"));

        // The body may arrive with the head or on a later read
        let mut body = leftover.to_vec();
        while body.len() < 7 {
            let mut chunk = [0u8; 16];
            let n = server.read(&mut chunk).await.unwrap();
            body.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(body, b"payload");
    }

    #[tokio::test]
    async fn test_reply_handshake_leftover() {
        let (mut client, mut server) = duplex(4096);

        let mut wire = build_response("").into_bytes();
        wire.extend_from_slice(b"first-bytes");
        server.write_all(&wire).await.unwrap();

        let (parser, leftover) = read_reply(&mut client).await.unwrap();
        assert_eq!(parser.status_code(), 200);
        assert_eq!(&leftover[..], b"first-bytes");
    }

    #[tokio::test]
    async fn test_read_request_split_across_reads() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"GET /a HT")
            .read(b"TP/1.1\r\nHo")
            .read(b"st: x\r\n")
            .read(b"\r\nbody")
            .build();

        let (parser, leftover) = read_request(&mut stream).await.unwrap();
        assert_eq!(parser.uri(), "/a");
        assert_eq!(parser.header("Host"), Some("x"));
        assert_eq!(&leftover[..], b"body");
    }

    #[tokio::test]
    async fn test_write_response_envelope() {
        let mut stream = tokio_test::io::Builder::new()
            .write(build_response("").as_bytes())
            .build();
        write_response(&mut stream).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_request_eof() {
        let (mut client, mut server) = duplex(64);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        drop(client);

        let err = read_request(&mut server).await.unwrap_err();
        assert!(matches!(err, RelayError::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_read_request_rejects_garbage() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x16, 0x03, 0x01, 0x00]).await.unwrap();

        let err = read_request(&mut server).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::Parse(ParseError::InvalidCharacter(0x16))
        ));
    }
}
