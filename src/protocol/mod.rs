//! Text Protocol Implementation
//!
//! This module implements the line-oriented protocol spoken by verkv clients.
//!
//! ## Modules
//!
//! - `types`: The `Command` and `Response` enums and response serialization
//! - `parser`: Incremental decoder for incoming requests
//!
//! ## Example
//!
//! ```
//! use verkv::protocol::{Command, RequestDecoder, Response};
//! use bytes::{Bytes, BytesMut};
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"get foo\r\n"[..]);
//! let command = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(command, Command::Get { key: "foo".to_string() });
//!
//! let response = Response::Value { value: Bytes::from("bar") };
//! assert_eq!(&response.serialize()[..], b"VALUE 3\r\nbar\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{ParseError, ParseResult, RequestDecoder, DEFAULT_MAX_VALUE_SIZE, MAX_LINE_LENGTH};
pub use types::{Command, Response};
