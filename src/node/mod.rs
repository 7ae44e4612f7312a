//! Storage node components
//!
//! The server side (blob store + HTTP surface) and the orchestrator-side
//! client for it.

pub mod client;
pub mod server;
pub mod store;

pub use client::NodeClient;
pub use store::{ShardStore, StoreError};
