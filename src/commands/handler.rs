//! Command Execution
//!
//! Runs decoded commands against the [`Store`] and builds the response.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │   Command ───> Store operation ───> Option<Response>        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A response is `None` only for a successful write that asked for
//! `noreply`. Errors are always reported.

use crate::protocol::{Command, Response};
use crate::storage::{ttl_from_secs, Store, StoreError};
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

/// Executes commands against the shared store.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<Store>,
}

impl CommandHandler {
    /// Creates a new command handler with the given store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Executes a command and returns the response to send, if any.
    pub fn execute(&self, command: Command) -> Option<Response> {
        match command {
            Command::Set {
                key,
                ttl,
                value,
                noreply,
            } => self.cmd_set(key, ttl, value, noreply),
            Command::Get { key } => Some(self.cmd_get(&key)),
            Command::GetMeta { key } => Some(self.cmd_getm(&key)),
            Command::Delete { key } => Some(self.cmd_delete(&key)),
            Command::Cas {
                key,
                ttl,
                version,
                value,
                noreply,
            } => self.cmd_cas(&key, ttl, version, value, noreply),
        }
    }

    fn cmd_set(&self, key: String, ttl: i64, value: Bytes, noreply: bool) -> Option<Response> {
        let version = self.store.write(key, ttl_from_secs(ttl), value);
        trace!(version = version, "set");
        reply(Response::Stored { version }, noreply)
    }

    fn cmd_get(&self, key: &str) -> Response {
        match self.store.read(key) {
            Some(snapshot) => Response::Value {
                value: snapshot.value,
            },
            None => Response::NotFound,
        }
    }

    fn cmd_getm(&self, key: &str) -> Response {
        match self.store.read(key) {
            Some(snapshot) => Response::ValueMeta {
                version: snapshot.version,
                ttl: snapshot.ttl,
                value: snapshot.value,
            },
            None => Response::NotFound,
        }
    }

    fn cmd_delete(&self, key: &str) -> Response {
        if self.store.delete(key) {
            Response::Deleted
        } else {
            Response::NotFound
        }
    }

    fn cmd_cas(
        &self,
        key: &str,
        ttl: i64,
        version: u64,
        value: Bytes,
        noreply: bool,
    ) -> Option<Response> {
        match self
            .store
            .compare_and_swap(key, version, ttl_from_secs(ttl), value)
        {
            Ok(version) => reply(Response::Stored { version }, noreply),
            Err(StoreError::NotFound) => Some(Response::NotFound),
            Err(StoreError::VersionMismatch { current }) => {
                trace!(key = key, expected = version, current = current, "cas conflict");
                Some(Response::VersionConflict)
            }
        }
    }
}

fn reply(response: Response, noreply: bool) -> Option<Response> {
    if noreply {
        None
    } else {
        Some(response)
    }
}
