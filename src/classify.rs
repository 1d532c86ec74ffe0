//! Maps raw error text to the user-facing wording.
//!
//! There are two independent tables: the landing form (a head line plus an
//! optional body, shown on the entry page) and the flat alert form used by
//! transient alerts.  Both match on exact error text and pass anything they
//! do not recognise through unchanged.

use std::fmt;

const SESSION_TIMEOUT: &str = "Failed to sign with your Ledger device. Session timeout.";
const CHECK_ADDRESS: &str = "Validation failed. Please check that you entered the right address.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Info,
	Alert,
}

/// A piece of body text; `Break` is a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Text(&'static str),
	Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichText(Vec<Segment>);

impl RichText {
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn segments(&self) -> &[Segment] {
		&self.0
	}
}

impl fmt::Display for RichText {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for segment in &self.0 {
			match segment {
				Segment::Text(text) => f.write_str(text)?,
				Segment::Break => f.write_str("\n")?,
			}
		}
		Ok(())
	}
}

/// Landing-page form of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
	pub severity: Severity,
	pub head: String,
	pub body: RichText,
}

/// Flat single-line form of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
	pub severity: Severity,
	pub message: String,
}

pub fn classify_landing(raw: &str) -> NormalizedError {
	let (head, body) = match raw {
		"Ledger device: UNKNOWN_ERROR (0x6804)"
		| "Failed to sign with Ledger device: U2F TIMEOUT" => (
			SESSION_TIMEOUT.to_owned(),
			vec![
				Segment::Text("Connect your Ledger device, unlock it"),
				Segment::Break,
				Segment::Text("and open the Kin application."),
			],
		),
		"Failed to sign with Ledger device: U2F DEVICE_INELIGIBLE" => (
			"Failed to sign with Ledger device:".to_owned(),
			vec![Segment::Text("The attached device is not a valid Ledger device.")],
		),
		other => (other.to_owned(), Vec::new()),
	};

	NormalizedError {
		severity: Severity::Info,
		head,
		body: RichText(body),
	}
}

pub fn classify_alert(raw: &str) -> AlertMessage {
	// The three address failures share one message on purpose.
	let message = match raw {
		"Error: invalid encoded string"
		| "Error: invalid version byte. expected 144, got 48"
		| "Error: invalid checksum" => CHECK_ADDRESS,
		"Error: Request failed with status code 400" => "Destination account not valid.",
		"Error: Request failed with status code 404" => "Destination account does not exist.",
		"TypeError: Cannot read property 'toString' of undefined" => {
			"Destination account not valid or empty."
		}
		"Failed to sign with Ledger device: U2F TIMEOUT"
		| "Ledger device: UNKNOWN_ERROR (0x6804)"
		| "Failed to sign with Ledger device: U2F DEVICE_INELIGIBLE" => SESSION_TIMEOUT,
		"Error: Network Error" => {
			"It seems that you are experiencing network issues. Please try again at a later time."
		}
		"Resource Missing" => "Account is missing or does not exist.",
		other => other,
	};

	AlertMessage {
		severity: Severity::Alert,
		message: message.to_owned(),
	}
}
