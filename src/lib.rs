//! Opslink client runtime.
//!
//! Two jobs: keep outbound API calls working while the short-lived access
//! credential expires (single-flight refresh, FIFO replay, forced logout on
//! exhaustion), and keep a live operational log feed ordered and
//! memory-bounded (one-shot bootstrap merged with the push channel behind
//! an operator pause gate).

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod feed;
pub mod gateway;

pub use client::OpslinkClient;
pub use errors::{ClientError, RefreshError};
