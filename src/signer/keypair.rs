use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};

use crate::error::BackendError;
use crate::model::{DecoratedSignature, Secret, SignedTransaction, UnsignedTransaction};
use crate::strkey;

use super::{KeyHandle, KeyPairSigner};

/// Signs with an ed25519 key derived from a secret seed (`S...`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeySigner;

impl LocalKeySigner {
	pub fn new() -> Self {
		Self
	}

	fn signing_key(secret: &Secret) -> Result<SigningKey, BackendError> {
		let seed = strkey::decode(strkey::SEED, secret.expose())?;
		Ok(SigningKey::from_bytes(&seed))
	}
}

impl KeyPairSigner for LocalKeySigner {
	fn from_secret(&self, secret: &Secret) -> Result<KeyHandle, BackendError> {
		let key = Self::signing_key(secret)?;
		Ok(KeyHandle::new(strkey::encode_account_id(
			key.verifying_key().as_bytes(),
		)))
	}

	fn sign_transaction(
		&self,
		secret: &Secret,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, BackendError> {
		let key = Self::signing_key(secret)?;
		let digest = Sha256::digest(tx.signature_base()?);
		let signature = key.sign(&digest);
		Ok(SignedTransaction {
			transaction: tx.clone(),
			signatures: vec![DecoratedSignature::new(
				key.verifying_key().as_bytes(),
				signature.to_bytes().to_vec(),
			)],
		})
	}
}
