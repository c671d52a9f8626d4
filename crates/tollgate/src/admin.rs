//! Admin API
//!
//! Monitoring and manual block management, mounted under `/_tollgate` outside
//! the gate. Every route requires `Authorization: Bearer <ADMIN_TOKEN>`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use tollgate_core::Gate;
use tollgate_core::audit::RecordKind;
use tollgate_core::blocklist::BlockEntry;

use crate::prelude::*;

pub const ADMIN_PREFIX: &str = "/_tollgate";

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

#[derive(Clone, Debug)]
pub struct AdminState {
	gate: Arc<Gate>,
	token: Arc<str>,
}

#[derive(Debug)]
pub enum AdminError {
	Unauthorized,
	StoreUnavailable,
	/// The store did not accept the write
	WriteFailed,
}

impl std::fmt::Display for AdminError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AdminError::Unauthorized => write!(f, "Unauthorized"),
			AdminError::StoreUnavailable => write!(f, "Store unavailable"),
			AdminError::WriteFailed => write!(f, "Store write failed"),
		}
	}
}

impl std::error::Error for AdminError {}

impl IntoResponse for AdminError {
	fn into_response(self) -> Response {
		let status = match self {
			AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
			AdminError::StoreUnavailable | AdminError::WriteFailed => StatusCode::SERVICE_UNAVAILABLE,
		};
		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

/// Proof that the request carried the admin token
#[derive(Debug)]
pub struct AdminAuth;

impl FromRequestParts<AdminState> for AdminAuth {
	type Rejection = AdminError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AdminState,
	) -> Result<Self, Self::Rejection> {
		let token = parts
			.headers
			.get(header::AUTHORIZATION)
			.and_then(|h| h.to_str().ok())
			.and_then(|h| h.strip_prefix("Bearer "))
			.map(str::trim);

		match token {
			Some(token) if token_matches(token, &state.token) => Ok(AdminAuth),
			_ => {
				warn!("Rejected admin request to {}", parts.uri.path());
				Err(AdminError::Unauthorized)
			}
		}
	}
}

// Compares every byte regardless of where the first mismatch is
fn token_matches(given: &str, expected: &str) -> bool {
	given.len() == expected.len()
		&& given.bytes().zip(expected.bytes()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
	limit: Option<usize>,
}

impl ListQuery {
	fn limit(&self) -> usize {
		self.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
	}
}

#[derive(Debug, Deserialize)]
pub struct BlockQuery {
	ttl_secs: Option<u64>,
}

fn require_store(state: &AdminState) -> Result<(), AdminError> {
	if state.gate.store_available() { Ok(()) } else { Err(AdminError::StoreUnavailable) }
}

async fn list_alerts(
	_auth: AdminAuth,
	State(state): State<AdminState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, AdminError> {
	require_store(&state)?;
	Ok(Json(state.gate.audit().recent(RecordKind::Alert, query.limit()).await))
}

async fn list_usage(
	_auth: AdminAuth,
	State(state): State<AdminState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Value>>, AdminError> {
	require_store(&state)?;
	Ok(Json(state.gate.audit().recent(RecordKind::Usage, query.limit()).await))
}

async fn list_blocks(
	_auth: AdminAuth,
	State(state): State<AdminState>,
) -> Result<Json<Vec<BlockEntry>>, AdminError> {
	require_store(&state)?;
	Ok(Json(state.gate.blocklist().list().await))
}

async fn put_block(
	_auth: AdminAuth,
	State(state): State<AdminState>,
	Path(ip): Path<String>,
	Query(query): Query<BlockQuery>,
) -> Result<Json<Value>, AdminError> {
	require_store(&state)?;
	let ttl = query.ttl_secs.map(Duration::from_secs);
	if !state.gate.blocklist().block(&ip, ttl).await {
		return Err(AdminError::WriteFailed);
	}
	Ok(Json(json!({ "ip": ip, "blocked": true })))
}

async fn delete_block(
	_auth: AdminAuth,
	State(state): State<AdminState>,
	Path(ip): Path<String>,
) -> Result<StatusCode, AdminError> {
	require_store(&state)?;
	if !state.gate.blocklist().unblock(&ip).await {
		return Err(AdminError::WriteFailed);
	}
	Ok(StatusCode::NO_CONTENT)
}

/// Admin routes, relative to `ADMIN_PREFIX`
pub fn router(gate: Arc<Gate>, token: &str) -> Router {
	let state = AdminState { gate, token: Arc::from(token) };
	Router::new()
		.route("/alerts", get(list_alerts))
		.route("/usage", get(list_usage))
		.route("/blocks", get(list_blocks))
		.route("/blocks/{ip}", put(put_block).delete(delete_block))
		.with_state(state)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_matches() {
		assert!(token_matches("s3cret", "s3cret"));
		assert!(!token_matches("s3cres", "s3cret"));
		assert!(!token_matches("s3cre", "s3cret"));
		assert!(!token_matches("", "s3cret"));
	}

	#[test]
	fn test_list_limit_is_capped() {
		assert_eq!(ListQuery { limit: None }.limit(), DEFAULT_LIST_LIMIT);
		assert_eq!(ListQuery { limit: Some(5) }.limit(), 5);
		assert_eq!(ListQuery { limit: Some(1_000_000) }.limit(), MAX_LIST_LIMIT);
	}
}

// vim: ts=4
