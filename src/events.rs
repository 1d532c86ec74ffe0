use crate::classify::{self, AlertMessage, NormalizedError};
use crate::model::{Account, Confirmation, Secret, SignedTransaction, UnsignedTransaction};

/// Everything the orchestrator tells its subscribers.
#[derive(Debug, Clone)]
pub enum Event {
	Loading(bool),
	LedgerConnected(bool),
	KeyPairInvalidated,
	KeyPairValidated {
		secret: Secret,
		public_key: String,
	},
	PublicKey(String),
	Account(Account),
	UnsignedTransaction(UnsignedTransaction),
	TransactionSigned(SignedTransaction),
	KeyPairTransactionSigned(SignedTransaction),
	TransactionSubmitted(Confirmation),
	Errors(Vec<ErrorReport>),
}

/// A failure as published: the extracted raw text.  The user-facing
/// forms are derived from it each time they are asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
	raw: String,
}

impl ErrorReport {
	pub fn new(raw: impl Into<String>) -> Self {
		Self { raw: raw.into() }
	}

	pub fn raw(&self) -> &str {
		&self.raw
	}

	pub fn landing(&self) -> NormalizedError {
		classify::classify_landing(&self.raw)
	}

	pub fn alert(&self) -> AlertMessage {
		classify::classify_alert(&self.raw)
	}
}

/// Connection flags owned by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
	pub ledger_connected: bool,
	pub key_pair_valid: bool,
}
