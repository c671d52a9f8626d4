//! Demo protected handler
//!
//! A minimal downstream service for running the gate standalone.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::prelude::*;

pub const SYSTEM_NAME: &str = "Protected System";

async fn get_status() -> Json<Value> {
	Json(json!({
		"system": SYSTEM_NAME,
		"status": "OPERATIONAL",
		"timestamp": Timestamp::now().to_iso(),
	}))
}

async fn protected_endpoint(State(fingerprint): State<Fingerprint>) -> Json<Value> {
	Json(json!({
		"message": "Protected endpoint",
		"fingerprint": fingerprint.short(),
	}))
}

pub fn router(fingerprint: Fingerprint) -> Router {
	Router::new()
		.route("/status", get(get_status))
		.fallback(protected_endpoint)
		.with_state(fingerprint)
}


// vim: ts=4
