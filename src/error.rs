use serde::Deserialize;
use thiserror::Error;

use crate::strkey::StrKeyError;

/// The raw failure vocabulary shared by every collaborator.
///
/// `Display` is the error's string form, the exact text the classifier
/// tables are keyed on (`Error: Request failed with status code 404`,
/// `Failed to sign with Ledger device: U2F TIMEOUT`, ...).  `message()`
/// is the same text without the error-kind prefix.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("Error: Request failed with status code {status}")]
	Http {
		status: u16,
		problem: Option<Problem>,
	},

	#[error("Error: Network Error")]
	Network(String),

	/// The node answered but a field needed to build the account was absent.
	#[error("TypeError: Cannot read property 'toString' of undefined")]
	EmptyResponse,

	#[error("Error: {0}")]
	StrKey(#[from] StrKeyError),

	#[error("{0}")]
	Device(#[from] DeviceError),

	#[error("Error: {0}")]
	Invalid(String),
}

impl BackendError {
	/// The error text without its `Error:` / `TypeError:` prefix.
	pub fn message(&self) -> String {
		match self {
			Self::Http { status, .. } => format!("Request failed with status code {status}"),
			Self::Network(_) => "Network Error".into(),
			Self::EmptyResponse => "Cannot read property 'toString' of undefined".into(),
			Self::StrKey(e) => e.to_string(),
			Self::Device(e) => e.to_string(),
			Self::Invalid(msg) => msg.clone(),
		}
	}

	/// The structured problem document returned by the node, if any.
	pub fn response(&self) -> Option<&Problem> {
		match self {
			Self::Http { problem, .. } => problem.as_ref(),
			_ => None,
		}
	}

	/// Extra context that never reaches the user-facing text.
	pub fn detail(&self) -> Option<&str> {
		match self {
			Self::Network(cause) => Some(cause),
			Self::Http { problem, .. } => problem.as_ref().and_then(|p| p.detail.as_deref()),
			_ => None,
		}
	}

	pub fn invalid(msg: impl Into<String>) -> Self {
		Self::Invalid(msg.into())
	}
}

/// An RFC 7807 problem document as returned by Horizon on failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Problem {
	#[serde(rename = "type", default)]
	pub kind: Option<String>,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub status: Option<u16>,
	#[serde(default)]
	pub detail: Option<String>,
}

/// Failures reported by the hardware signer and its transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
	#[error("Failed to sign with Ledger device: U2F TIMEOUT")]
	Timeout,

	#[error("Failed to sign with Ledger device: U2F DEVICE_INELIGIBLE")]
	Ineligible,

	#[error("Ledger device: {} (0x{:04x})", status_name(.0), .0)]
	Status(u16),
}

/// Status word names reported by the Ledger transport.
fn status_name(sw: &u16) -> &'static str {
	match *sw {
		0x6700 => "INCORRECT_LENGTH",
		0x6800 => "MISSING_CRITICAL_PARAMETER",
		0x6982 => "SECURITY_STATUS_NOT_SATISFIED",
		0x6985 => "CONDITIONS_OF_USE_NOT_SATISFIED",
		0x6a80 => "INCORRECT_DATA",
		0x6a82 => "FILE_NOT_FOUND",
		0x6b00 => "INCORRECT_P1_P2",
		0x6d00 => "INS_NOT_SUPPORTED",
		0x6e00 => "CLA_NOT_SUPPORTED",
		0x6f00 => "TECHNICAL_PROBLEM",
		0x5515 => "LOCKED_DEVICE",
		_ => "UNKNOWN_ERROR",
	}
}

/// How a workflow turns a raw failure into the text it publishes.
///
/// The rules differ per workflow and produce different text for the same
/// failure, so they stay separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
	/// The error's full string form.
	Stringified,
	/// The problem title when the node returned a structured body,
	/// otherwise the prefix-less message.
	ResponseTitleOrMessage,
}

impl Extraction {
	pub fn extract(self, err: &BackendError) -> String {
		match self {
			Self::Stringified => err.to_string(),
			Self::ResponseTitleOrMessage => match err.response() {
				Some(problem) => problem.title.clone().unwrap_or_else(|| err.message()),
				None => err.message(),
			},
		}
	}
}
