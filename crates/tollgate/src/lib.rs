//! Tollgate request gate server.
//!
//! Puts the gate from `tollgate-core` in front of a protected axum router,
//! adds the admin API for monitoring and manual blocks, and runs the server.

#![forbid(unsafe_code)]

pub mod admin;
pub mod app;
pub mod demo;
pub mod prelude;

pub use app::{AppBuilder, VERSION};
pub use tollgate_core::{Gate, GateBuilder, GateConfig, RetentionConfig};

// vim: ts=4
