//! Command Handler Module
//!
//! Receives decoded commands, executes them against the store and returns
//! the response to send.
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ RequestDecoder  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `set`, `cas` (with optional `noreply`)
//! - `get`, `getm`
//! - `delete`

pub mod handler;

pub use handler::CommandHandler;
