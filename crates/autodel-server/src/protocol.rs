//! Inline text protocol.
//!
//! A request is one line of whitespace-separated arguments ending in `\n`
//! (a preceding `\r` is dropped). An argument wrapped in double quotes may
//! contain spaces and the escapes `\"`, `\\`, `\n`, `\r`, `\t` and `\xHH`,
//! so arbitrary binary keys can be sent.
//!
//! Replies use the usual single-line markers:
//! `+OK`, `:<integer>`, `$<len>` followed by the bytes (`$-1` for nil) and
//! `-<message>` for errors. Every reply line ends in `\r\n`.

use autodel_module::Reply;
use bytes::{Buf, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};

/// Splits a byte stream into request argument vectors.
#[derive(Clone, Copy, Debug)]
pub struct LineCodec {
    max_line: usize,
}

impl LineCodec {
    pub fn new(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Take one complete request off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Blank lines decode to
    /// an empty argument vector.
    pub fn decode(&self, buf: &mut BytesMut) -> ProtocolResult<Option<Vec<Vec<u8>>>> {
        let Some(end) = buf.iter().position(|&b| b == b'\n') else {
            if buf.len() > self.max_line {
                return Err(ProtocolError::LineTooLong { max: self.max_line });
            }
            return Ok(None);
        };
        if end > self.max_line {
            return Err(ProtocolError::LineTooLong { max: self.max_line });
        }

        let line = buf.split_to(end);
        buf.advance(1);
        let line = line.strip_suffix(b"\r").unwrap_or(&line);
        split_args(line).map(Some)
    }
}

/// Split a request line into arguments.
pub fn split_args(line: &[u8]) -> ProtocolResult<Vec<Vec<u8>>> {
    let mut args = Vec::new();
    let mut bytes = line.iter().copied().peekable();

    loop {
        while bytes.next_if(u8::is_ascii_whitespace).is_some() {}
        let Some(first) = bytes.next() else {
            return Ok(args);
        };

        let mut arg = Vec::new();
        if first == b'"' {
            loop {
                match bytes.next().ok_or(ProtocolError::UnbalancedQuotes)? {
                    b'"' => break,
                    b'\\' => arg.push(unescape(&mut bytes)?),
                    b => arg.push(b),
                }
            }
            // A closing quote must end the argument.
            if bytes.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
                return Err(ProtocolError::UnbalancedQuotes);
            }
        } else {
            arg.push(first);
            while let Some(b) = bytes.next_if(|b| !b.is_ascii_whitespace()) {
                arg.push(b);
            }
        }
        args.push(arg);
    }
}

fn unescape(bytes: &mut impl Iterator<Item = u8>) -> ProtocolResult<u8> {
    let escaped = match bytes.next().ok_or(ProtocolError::UnbalancedQuotes)? {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'"' => b'"',
        b'\\' => b'\\',
        b'x' => {
            let hi = bytes.next().and_then(hex_digit);
            let lo = bytes.next().and_then(hex_digit);
            match (hi, lo) {
                (Some(hi), Some(lo)) => (hi << 4) | lo,
                _ => return Err(ProtocolError::InvalidEscape),
            }
        }
        _ => return Err(ProtocolError::InvalidEscape),
    };
    Ok(escaped)
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Wire form of a reply.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    match reply {
        Reply::Ok => b"+OK\r\n".to_vec(),
        Reply::Pong => b"+PONG\r\n".to_vec(),
        Reply::Integer(n) => format!(":{n}\r\n").into_bytes(),
        Reply::Bulk(None) => b"$-1\r\n".to_vec(),
        Reply::Bulk(Some(bytes)) => {
            let mut out = format!("${}\r\n", bytes.len()).into_bytes();
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
            out
        }
        Reply::Error(message) => {
            // Keep the reply on one line.
            let message = message.replace(['\r', '\n'], " ");
            format!("-{message}\r\n").into_bytes()
        }
    }
}
