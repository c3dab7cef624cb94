//! Single-node in-memory key-value store served over HTTP.
//!
//! The server keeps every entry in memory behind one lock and snapshots the
//! whole map to a JSON file in the background, plus once more on shutdown.
//! Each module focuses on a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface for server and client modes.
//! - [`store`] holds the key/value map and enforces the size limits.
//! - [`server`] routes `/db` and `/metrics` requests and owns the process
//!   lifecycle: listener, snapshot task, and signal-driven shutdown.
//! - [`snapshot`] periodically persists the store to disk.
//! - [`metrics`] counts handled requests for the `/metrics` exposition.
//! - [`client`] issues a single get/put/delete request against a server.
//!
//! Integration and end-to-end tests use this crate directly to exercise the
//! store, the HTTP surface, and the shutdown path.

pub mod cli;
pub mod client;
pub mod metrics;
pub mod server;
pub mod snapshot;
pub mod store;
