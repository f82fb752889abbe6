//! Travels Read-Replica Service
//!
//! Read-only analytical queries over a fixed, immutable dataset of users,
//! locations, and visits, served through a minimal hand-rolled HTTP
//! interface. Built for a benchmark workload: known bounded dataset, maximum
//! throughput, no per-request allocation on the success path.
//!
//! # Architecture
//!
//! ```text
//! Acceptor ──round-robin──▶ Worker (event loop, owns its connections)
//!                              │
//!                   frame ──▶ http::request (zero-copy parse)
//!                              │
//!                   route ──▶ query (filtered scans over EntityStore)
//!                              │
//!                   body  ──▶ http::response (pooled scratch buffers)
//!                              │
//!                   write ◀── server (synchronous, same read event)
//! ```
//!
//! The store is populated once by [`loader`] before any worker starts, then
//! finalized (VisitsIndex sort) and never mutated again, so concurrent reads
//! need no locks. Everything else in the serving path reuses per-connection
//! or pooled buffers.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod loader;
pub mod pool;
pub mod query;
pub mod server;
pub mod store;

// Re-export the types a deployment touches.
pub use config::{DataOptions, DatasetSize, ServiceConfig};
pub use error::{LoadError, RequestError};
pub use query::QueryEngine;
pub use server::{handle_request, Server, ServiceState, DEFAULT_WORKERS};
pub use store::EntityStore;
