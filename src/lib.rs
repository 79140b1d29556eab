//! # verkv - An In-Memory, Versioned Key-Value Cache
//!
//! verkv stores byte values under string keys with an optional time-to-live.
//! Every key carries a version counter so clients can update values with
//! compare-and-swap instead of blind overwrites.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              verkv                                  │
//! │                                                                     │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐              │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │              │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │              │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘              │
//! │                            │                  │                     │
//! │                            ▼                  ▼                     │
//! │                     ┌─────────────┐    ┌──────────────────────────┐ │
//! │                     │  Request    │    │          Store           │ │
//! │                     │  Decoder    │    │ RwLock<HashMap<..Entry>> │ │
//! │                     └─────────────┘    └──────────────────────────┘ │
//! │                                               ▲                     │
//! │                                   ┌───────────┴──────────┐          │
//! │                                   │  Reaper (optional)   │          │
//! │                                   └──────────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! ```text
//! set <key> <ttl> <nbytes> [noreply]\r\n<value>\r\n      -> OK <version>
//! cas <key> <ttl> <version> <nbytes> [noreply]\r\n<value>\r\n
//!                                                        -> OK <version> | ERR_VERSION | ERRNOTFOUND
//! get <key>\r\n                                          -> VALUE <nbytes>\r\n<value>
//! getm <key>\r\n                                         -> VALUE <version> <ttl> <nbytes>\r\n<value>
//! delete <key>\r\n                                       -> DELETED | ERRNOTFOUND
//! ```
//!
//! A ttl of zero or less means the key never expires. Malformed requests are
//! answered with `ERRCMDERR`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Command/response types and the incremental request decoder
//! - [`storage`]: The versioned store and the background reaper
//! - [`commands`]: Executes commands against the store
//! - [`connection`]: Per-client connection loop
//! - [`config`]: Command-line configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod storage;

pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, ParseError, RequestDecoder, Response};
pub use storage::{Reaper, ReaperConfig, Store, StoreError};

/// The default port verkv listens on
pub const DEFAULT_PORT: u16 = 9000;

/// The default host verkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of verkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
