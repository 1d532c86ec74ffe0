pub mod keypair;
pub mod ledger;

use std::sync::Arc;

use crate::config::{Config, SignerMethod};
use crate::error::BackendError;
use crate::model::{Secret, SignedTransaction, UnsignedTransaction};

/// Derivation path of the first Kin account on a Ledger.
pub const KIN_DERIVATION_PATH: &str = "44'/2017'/0'";

/// A resolved key.  Only the public half ever leaves a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
	public_key: String,
}

impl KeyHandle {
	pub fn new(public_key: String) -> Self {
		Self { public_key }
	}

	/// The account id (`G...`) of this key.
	pub fn public_key(&self) -> &str {
		&self.public_key
	}
}

/// A signer that keeps its keys on an external device.  Every call is
/// device I/O and may suspend for as long as the user takes to confirm.
#[async_trait::async_trait]
pub trait HardwareSigner: Send + Sync {
	/// Read the public key at `derivation_path`.
	async fn get_public_key(&self, derivation_path: &str) -> Result<KeyHandle, BackendError>;

	/// Present `tx` on the device for approval and return it signed.
	async fn sign_transaction(
		&self,
		derivation_path: &str,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, BackendError>;
}

/// A signer that holds the secret seed in memory and signs synchronously.
pub trait KeyPairSigner: Send + Sync {
	fn from_secret(&self, secret: &Secret) -> Result<KeyHandle, BackendError>;

	fn sign_transaction(
		&self,
		secret: &Secret,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, BackendError>;
}

/// Build the Ledger signer described by the config.
pub fn ledger_from_config(config: &Config) -> Arc<dyn HardwareSigner> {
	let transport = ledger::SpeculosTransport::new(
		config.ledger.transport.clone(),
		std::time::Duration::from_secs(config.ledger.timeout_secs),
	);
	Arc::new(ledger::LedgerSigner::new(transport))
}

/// Human-readable name of a signing method.
pub fn method_label(method: &SignerMethod) -> &'static str {
	match method {
		SignerMethod::Ledger => "ledger",
		SignerMethod::Keypair => "keypair",
	}
}
