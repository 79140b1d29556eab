//! Protocol Data Types
//!
//! This module defines the commands a client can send and the responses the
//! server writes back.
//!
//! ## Protocol Format
//!
//! Requests are single ASCII lines terminated by `\r\n`. Write commands are
//! followed by a payload line of exactly `nbytes` bytes:
//!
//! ```text
//! set <key> <ttl> <nbytes> [noreply]\r\n<value>\r\n
//! cas <key> <ttl> <version> <nbytes> [noreply]\r\n<value>\r\n
//! get <key>\r\n
//! getm <key>\r\n
//! delete <key>\r\n
//! ```
//!
//! Responses:
//!
//! ```text
//! OK <version>\r\n
//! VALUE <nbytes>\r\n<value>\r\n
//! VALUE <version> <ttl> <nbytes>\r\n<value>\r\n
//! DELETED\r\n
//! ERRCMDERR\r\n | ERRNOTFOUND\r\n | ERR_VERSION\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// The line terminator used in both directions
pub const CRLF: &[u8] = b"\r\n";

/// Literal error lines
pub mod error_line {
    pub const COMMAND: &str = "ERRCMDERR";
    pub const NOT_FOUND: &str = "ERRNOTFOUND";
    pub const VERSION: &str = "ERR_VERSION";
}

/// A fully decoded client request, payload included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `set <key> <ttl> <nbytes> [noreply]`
    Set {
        key: String,
        ttl: i64,
        value: Bytes,
        noreply: bool,
    },

    /// `get <key>`
    Get { key: String },

    /// `getm <key>`: value plus version and remaining ttl
    GetMeta { key: String },

    /// `delete <key>`
    Delete { key: String },

    /// `cas <key> <ttl> <version> <nbytes> [noreply]`
    Cas {
        key: String,
        ttl: i64,
        version: u64,
        value: Bytes,
        noreply: bool,
    },
}

impl Command {
    /// The protocol verb for this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "set",
            Command::Get { .. } => "get",
            Command::GetMeta { .. } => "getm",
            Command::Delete { .. } => "delete",
            Command::Cas { .. } => "cas",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. }
            | Command::Get { key }
            | Command::GetMeta { key }
            | Command::Delete { key }
            | Command::Cas { key, .. } => key,
        }
    }
}

/// A response sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `OK <version>`
    Stored { version: u64 },

    /// `VALUE <nbytes>` followed by the value
    Value { value: Bytes },

    /// `VALUE <version> <ttl> <nbytes>` followed by the value
    ValueMeta {
        version: u64,
        ttl: Option<Duration>,
        value: Bytes,
    },

    /// `DELETED`
    Deleted,

    /// `ERRCMDERR`
    CommandError,

    /// `ERRNOTFOUND`
    NotFound,

    /// `ERR_VERSION`
    VersionConflict,
}

impl Response {
    /// True for the `ERR*` responses.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::CommandError | Response::NotFound | Response::VersionConflict
        )
    }

    /// Serializes the response to bytes for sending over the network.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_len_hint());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Writes the wire form of the response into a buffer.
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Response::Stored { version } => {
                buf.put_slice(format!("OK {}", version).as_bytes());
                buf.put_slice(CRLF);
            }
            Response::Value { value } => {
                buf.put_slice(format!("VALUE {}", value.len()).as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(value);
                buf.put_slice(CRLF);
            }
            Response::ValueMeta {
                version,
                ttl,
                value,
            } => {
                buf.put_slice(
                    format!("VALUE {} {} {}", version, format_ttl(*ttl), value.len()).as_bytes(),
                );
                buf.put_slice(CRLF);
                buf.put_slice(value);
                buf.put_slice(CRLF);
            }
            Response::Deleted => {
                buf.put_slice(b"DELETED");
                buf.put_slice(CRLF);
            }
            Response::CommandError => {
                buf.put_slice(error_line::COMMAND.as_bytes());
                buf.put_slice(CRLF);
            }
            Response::NotFound => {
                buf.put_slice(error_line::NOT_FOUND.as_bytes());
                buf.put_slice(CRLF);
            }
            Response::VersionConflict => {
                buf.put_slice(error_line::VERSION.as_bytes());
                buf.put_slice(CRLF);
            }
        }
    }

    fn serialized_len_hint(&self) -> usize {
        match self {
            Response::Value { value } | Response::ValueMeta { value, .. } => value.len() + 48,
            _ => 24,
        }
    }
}

/// `0` for never-expiring entries, otherwise remaining seconds with two decimals.
fn format_ttl(ttl: Option<Duration>) -> String {
    match ttl {
        None => "0".to_string(),
        Some(ttl) => format!("{:.2}", ttl.as_secs_f64()),
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Stored { version } => write!(f, "OK {}", version),
            Response::Value { value } => write!(f, "VALUE {}", value.len()),
            Response::ValueMeta {
                version,
                ttl,
                value,
            } => write!(f, "VALUE {} {} {}", version, format_ttl(*ttl), value.len()),
            Response::Deleted => write!(f, "DELETED"),
            Response::CommandError => write!(f, "{}", error_line::COMMAND),
            Response::NotFound => write!(f, "{}", error_line::NOT_FOUND),
            Response::VersionConflict => write!(f, "{}", error_line::VERSION),
        }
    }
}
