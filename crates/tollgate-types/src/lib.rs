//! Shared types, adapter traits, and core utilities for Tollgate.
//!
//! This crate contains the foundational types that are shared between the
//! gate and all key-value adapter implementations, so adapter crates can
//! compile without pulling in the HTTP stack.

#![forbid(unsafe_code)]

pub mod error;
pub mod kv_adapter;
pub mod prelude;
pub mod types;
pub mod utils;

// vim: ts=4
