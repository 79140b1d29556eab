//! Incremental Request Decoder
//!
//! This module turns the raw byte stream of a connection into [`Command`]s.
//!
//! ## How the Decoder Works
//!
//! The decoder reads from a `BytesMut` and consumes exactly the bytes that
//! belong to the command it returns:
//! - `Ok(Some(command))` - A complete command (payload included) was decoded
//! - `Ok(None)` - Need more data, nothing usable is buffered yet
//! - `Err(ParseError)` - The request was malformed, see [`ParseError::is_fatal`]
//!
//! Write commands carry a payload of `nbytes` bytes. The decoder remembers a
//! parsed header between calls, so a payload may arrive across any number of
//! socket reads.
//!
//! A line ends at `\r`. The `\n` that normally follows is dropped whenever it
//! shows up, even if it arrives in a later read.

use crate::protocol::types::Command;
use bytes::{Buf, BytesMut};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while decoding a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The command line held no words
    #[error("empty command line")]
    EmptyCommand,

    /// The verb is not one we know
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Argument count outside the allowed range
    #[error("wrong number of arguments for '{command}': {got}")]
    WrongArity { command: &'static str, got: usize },

    /// ttl, version or nbytes is not a valid integer
    #[error("invalid {field}: {value}")]
    InvalidInteger { field: &'static str, value: String },

    /// Last argument present but not `noreply`
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    /// The command line is not valid UTF-8
    #[error("invalid UTF-8 in command line")]
    InvalidUtf8,

    /// Declared payload exceeds the configured maximum
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// No line terminator within the maximum line length
    #[error("command line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },

    /// The byte at the declared payload length is not a terminator
    #[error("payload does not match declared size of {declared} bytes")]
    PayloadMismatch { declared: usize },
}

impl ParseError {
    /// Fatal errors leave the stream at an unknown position; the
    /// connection has to be closed after reporting them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParseError::LineTooLong { .. } | ParseError::PayloadMismatch { .. }
        )
    }
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a command line, terminator excluded.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Default maximum payload size (1 MB)
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// The parsed line of a write command, waiting for its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    key: String,
    ttl: i64,
    /// Set for `cas`
    version: Option<u64>,
    nbytes: usize,
    noreply: bool,
}

impl Header {
    fn into_command(self, value: bytes::Bytes) -> Command {
        match self.version {
            Some(version) => Command::Cas {
                key: self.key,
                ttl: self.ttl,
                version,
                value,
                noreply: self.noreply,
            },
            None => Command::Set {
                key: self.key,
                ttl: self.ttl,
                value,
                noreply: self.noreply,
            },
        }
    }
}

enum Line {
    Complete(Command),
    NeedsPayload(Header),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Waiting for a command line
    Line,
    /// Header parsed, waiting for `nbytes` bytes and the terminator
    Payload(Header),
    /// Skipping the payload of a rejected write command
    Discard { remaining: usize },
}

/// A stateful request decoder, one per connection.
///
/// # Example
///
/// ```
/// use verkv::protocol::{Command, RequestDecoder};
/// use bytes::{Bytes, BytesMut};
///
/// let mut decoder = RequestDecoder::new();
/// let mut buffer = BytesMut::from(&b"set foo 0 3\r\nba"[..]);
/// assert_eq!(decoder.decode(&mut buffer), Ok(None));
///
/// buffer.extend_from_slice(b"r\r\n");
/// let command = decoder.decode(&mut buffer).unwrap().unwrap();
/// assert_eq!(
///     command,
///     Command::Set { key: "foo".into(), ttl: 0, value: Bytes::from("bar"), noreply: false }
/// );
/// ```
#[derive(Debug)]
pub struct RequestDecoder {
    state: State,
    /// A `\r` was consumed; drop the next byte if it is `\n`
    skip_lf: bool,
    max_value_size: usize,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDecoder {
    /// Creates a decoder with the default value size limit.
    pub fn new() -> Self {
        Self::with_max_value_size(DEFAULT_MAX_VALUE_SIZE)
    }

    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self {
            state: State::Line,
            skip_lf: false,
            max_value_size,
        }
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }

    /// Attempts to decode one command from the front of `buf`.
    ///
    /// Consumed bytes are removed from `buf`; on `Ok(None)` the decoder may
    /// have consumed a command line whose payload is still missing.
    pub fn decode(&mut self, buf: &mut BytesMut) -> ParseResult<Option<Command>> {
        loop {
            if self.skip_lf {
                match buf.first() {
                    None => return Ok(None),
                    Some(b'\n') => buf.advance(1),
                    Some(_) => {}
                }
                self.skip_lf = false;
            }

            match std::mem::replace(&mut self.state, State::Line) {
                State::Line => {
                    let pos = match find_cr(buf) {
                        Some(pos) if pos <= MAX_LINE_LENGTH => pos,
                        Some(pos) => {
                            return Err(ParseError::LineTooLong {
                                len: pos,
                                max: MAX_LINE_LENGTH,
                            })
                        }
                        None if buf.len() > MAX_LINE_LENGTH => {
                            return Err(ParseError::LineTooLong {
                                len: buf.len(),
                                max: MAX_LINE_LENGTH,
                            })
                        }
                        None => return Ok(None),
                    };

                    let line = buf.split_to(pos);
                    buf.advance(1);
                    self.skip_lf = true;

                    match self.parse_line(&line) {
                        Ok(Line::Complete(command)) => return Ok(Some(command)),
                        Ok(Line::NeedsPayload(header)) => {
                            self.state = State::Payload(header);
                        }
                        Err(e) => {
                            if let Some(remaining) = declared_payload(&line) {
                                self.state = State::Discard { remaining };
                            }
                            return Err(e);
                        }
                    }
                }
                State::Payload(header) => {
                    let nbytes = header.nbytes;
                    if buf.len() <= nbytes {
                        buf.reserve(nbytes + 2 - buf.len());
                        self.state = State::Payload(header);
                        return Ok(None);
                    }

                    if buf[nbytes] != b'\r' {
                        return Err(ParseError::PayloadMismatch { declared: nbytes });
                    }

                    let value = buf.split_to(nbytes).freeze();
                    buf.advance(1);
                    self.skip_lf = true;
                    return Ok(Some(header.into_command(value)));
                }
                State::Discard { mut remaining } => {
                    let n = remaining.min(buf.len());
                    buf.advance(n);
                    remaining -= n;

                    if remaining > 0 || buf.is_empty() {
                        self.state = State::Discard { remaining };
                        return Ok(None);
                    }

                    if buf[0] == b'\r' {
                        buf.advance(1);
                        self.skip_lf = true;
                    }
                }
            }
        }
    }

    fn parse_line(&self, line: &[u8]) -> ParseResult<Line> {
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8)?;
        let args: Vec<&str> = line.split_whitespace().collect();

        let (name, rest) = match args.split_first() {
            Some((name, rest)) => (*name, rest),
            None => return Err(ParseError::EmptyCommand),
        };

        match name {
            "set" => self.parse_set(rest),
            "cas" => self.parse_cas(rest),
            "get" => Ok(Line::Complete(Command::Get {
                key: single_key("get", rest)?,
            })),
            "getm" => Ok(Line::Complete(Command::GetMeta {
                key: single_key("getm", rest)?,
            })),
            "delete" => Ok(Line::Complete(Command::Delete {
                key: single_key("delete", rest)?,
            })),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    // set <key> <ttl> <nbytes> [noreply]
    fn parse_set(&self, args: &[&str]) -> ParseResult<Line> {
        if !(3..=4).contains(&args.len()) {
            return Err(ParseError::WrongArity {
                command: "set",
                got: args.len(),
            });
        }

        Ok(Line::NeedsPayload(Header {
            key: args[0].to_string(),
            ttl: parse_int("ttl", args[1])?,
            version: None,
            nbytes: self.parse_nbytes(args[2])?,
            noreply: parse_noreply(args.get(3))?,
        }))
    }

    // cas <key> <ttl> <version> <nbytes> [noreply]
    fn parse_cas(&self, args: &[&str]) -> ParseResult<Line> {
        if !(4..=5).contains(&args.len()) {
            return Err(ParseError::WrongArity {
                command: "cas",
                got: args.len(),
            });
        }

        Ok(Line::NeedsPayload(Header {
            key: args[0].to_string(),
            ttl: parse_int("ttl", args[1])?,
            version: Some(parse_int("version", args[2])?),
            nbytes: self.parse_nbytes(args[3])?,
            noreply: parse_noreply(args.get(4))?,
        }))
    }

    fn parse_nbytes(&self, arg: &str) -> ParseResult<usize> {
        let size: usize = parse_int("nbytes", arg)?;
        if size > self.max_value_size {
            return Err(ParseError::ValueTooLarge {
                size,
                max: self.max_value_size,
            });
        }
        Ok(size)
    }
}

fn single_key(command: &'static str, args: &[&str]) -> ParseResult<String> {
    match args {
        [key] => Ok(key.to_string()),
        _ => Err(ParseError::WrongArity {
            command,
            got: args.len(),
        }),
    }
}

fn parse_int<T: FromStr>(field: &'static str, arg: &str) -> ParseResult<T> {
    arg.parse().map_err(|_| ParseError::InvalidInteger {
        field,
        value: arg.to_string(),
    })
}

fn parse_noreply(arg: Option<&&str>) -> ParseResult<bool> {
    match arg {
        None => Ok(false),
        Some(&"noreply") => Ok(true),
        Some(other) => Err(ParseError::UnexpectedArgument(other.to_string())),
    }
}

/// Payload length announced by a write command line with a valid shape,
/// used to skip the payload when the command itself is rejected.
fn declared_payload(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let args: Vec<&str> = line.split_whitespace().collect();
    let index = match (*args.first()?, args.len()) {
        ("set", 4..=5) => 3,
        ("cas", 5..=6) => 4,
        _ => return None,
    };
    args[index].parse().ok()
}

#[inline]
fn find_cr(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\r')
}
