//! Error type shared by the gate and all adapter crates.

use std::fmt;

pub type TgResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	/// The key-value store could not be reached or rejected the operation
	StoreUnavailable(String),
	/// A store call did not finish within the configured bound
	Timeout,
	Parse,
	/// The downstream handler failed
	Handler(String),
	/// The response could not be read back for decoration
	Decorate(String),
	Config(String),

	// externals
	Io(std::io::Error),
	Json(serde_json::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::StoreUnavailable(msg) => write!(f, "store unavailable: {}", msg),
			Error::Timeout => write!(f, "store operation timed out"),
			Error::Parse => write!(f, "parse error"),
			Error::Handler(msg) => write!(f, "handler failed: {}", msg),
			Error::Decorate(msg) => write!(f, "decoration failed: {}", msg),
			Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
			Error::Io(e) => write!(f, "io error: {}", e),
			Error::Json(e) => write!(f, "json error: {}", e),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(e) => Some(e),
			Error::Json(e) => Some(e),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Json(err)
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(_: std::num::ParseIntError) -> Self {
		Self::Parse
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		Self::StoreUnavailable(err.to_string())
	}
}


// vim: ts=4
