//! Storage Module
//!
//! The versioned key-value [`Store`] and the optional background [`Reaper`].
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │                Store                  │
//! │   RwLock<HashMap<String, Entry>>      │
//! └───────────────────────────────────────┘
//!                    ▲
//!                    │ expired_keys() / remove_if_expired()
//!      ┌─────────────┴─────────────┐
//!      │          Reaper           │
//!      │  (Background Tokio Task)  │
//!      └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use verkv::storage::Store;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let store = Store::new();
//! assert_eq!(store.write("name", None, Bytes::from("bar")), 1);
//! assert_eq!(store.read("name").unwrap().value, Bytes::from("bar"));
//!
//! store.write("session", Some(Duration::from_secs(3600)), Bytes::from("token"));
//! assert!(store.read("session").unwrap().ttl.is_some());
//! ```

pub mod reaper;
pub mod store;

pub use reaper::{sweep, Reaper, ReaperConfig};
pub use store::{ttl_from_secs, Entry, Snapshot, Store, StoreError, StoreStats};
