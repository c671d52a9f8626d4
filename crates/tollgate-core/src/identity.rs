//! Identity Extractor
//!
//! Derives the client identity and request domain from request metadata.
//! Nothing here can fail: anything that cannot be resolved becomes `"unknown"`.

use axum::http::{HeaderMap, HeaderName, Request, Uri, header};
use url::Url;

pub const UNKNOWN: &str = "unknown";

/// Request metadata the policy, tracker and audit log need.
///
/// Captured before the request is handed to the downstream handler.
#[derive(Clone, Debug)]
pub struct RequestMeta {
	pub identity: Box<str>,
	pub domain: Box<str>,
	pub endpoint: Box<str>,
	pub user_agent: Option<Box<str>>,
	pub referer: Option<Box<str>>,
	pub accept_language: Option<Box<str>>,
	pub accept: Option<Box<str>>,
}

impl RequestMeta {
	pub fn from_parts(uri: &Uri, headers: &HeaderMap, trusted_ip_headers: &[HeaderName]) -> Self {
		Self {
			identity: extract_client_identity(headers, trusted_ip_headers),
			domain: extract_domain(uri, headers),
			endpoint: uri.path().into(),
			user_agent: header_value(headers, &header::USER_AGENT),
			referer: header_value(headers, &header::REFERER),
			accept_language: header_value(headers, &header::ACCEPT_LANGUAGE),
			accept: header_value(headers, &header::ACCEPT),
		}
	}

	pub fn from_request<B>(req: &Request<B>, trusted_ip_headers: &[HeaderName]) -> Self {
		Self::from_parts(req.uri(), req.headers(), trusted_ip_headers)
	}
}

/// Client identity from the first trusted header with a non-empty value.
///
/// The value is taken verbatim (trimmed); its IP syntax is not validated.
pub fn extract_client_identity(headers: &HeaderMap, trusted_ip_headers: &[HeaderName]) -> Box<str> {
	trusted_ip_headers
		.iter()
		.find_map(|name| header_value(headers, name))
		.unwrap_or_else(|| UNKNOWN.into())
}

/// Host of the request URL: the absolute-form URI if present, else the `Host` header
pub fn extract_domain(uri: &Uri, headers: &HeaderMap) -> Box<str> {
	let host = if uri.scheme().is_some() && uri.authority().is_some() {
		host_of(&uri.to_string())
	} else {
		headers
			.get(header::HOST)
			.and_then(|h| h.to_str().ok())
			.and_then(|host| host_of(&format!("http://{}/", host.trim())))
	};
	host.unwrap_or_else(|| UNKNOWN.into())
}

fn host_of(url: &str) -> Option<Box<str>> {
	Url::parse(url).ok()?.host_str().filter(|h| !h.is_empty()).map(Box::from)
}

/// Non-empty header value; values that are not visible ASCII count as missing
fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<Box<str>> {
	headers
		.get(name)
		.and_then(|h| h.to_str().ok())
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(Box::from)
}


// vim: ts=4
