//! Request gate for Tollgate.
//!
//! The gate wraps a downstream handler: it decides per request whether to let
//! it through, records usage and abuse signals in a key-value store, and marks
//! allowed responses with the deployment fingerprint.

#![forbid(unsafe_code)]

pub mod audit;
pub mod blocklist;
pub mod config;
pub mod decorate;
pub mod error;
pub mod gate;
pub mod identity;
pub mod keys;
pub mod middleware;
pub mod policy;
pub mod prelude;
pub mod store;
pub mod tracker;

pub use config::{GateConfig, RetentionConfig};
pub use gate::{Gate, GateBuilder};
pub use middleware::{GateLayer, GateService};

// vim: ts=4
