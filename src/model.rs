use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::xdr;

/// Quarks per KIN.
pub const QUARKS_PER_KIN: i64 = 100_000;
const DECIMALS: usize = 5;

/// A native amount, held as integer quarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
	pub fn from_quarks(quarks: i64) -> Self {
		Self(quarks)
	}

	pub fn quarks(&self) -> i64 {
		self.0
	}

	/// Parse decimal KIN text such as `"12"` or `"0.25"`.
	pub fn parse_kin(text: &str) -> Result<Self, BackendError> {
		let invalid = || BackendError::invalid(format!("invalid amount: {text}"));
		let text = text.trim();
		let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
		if whole.is_empty() && frac.is_empty() {
			return Err(invalid());
		}
		if frac.len() > DECIMALS
			|| !whole.chars().all(|c| c.is_ascii_digit())
			|| !frac.chars().all(|c| c.is_ascii_digit())
		{
			return Err(invalid());
		}

		let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
		let frac: i64 = format!("{frac:0<DECIMALS$}").parse().map_err(|_| invalid())?;
		let quarks = whole
			.checked_mul(QUARKS_PER_KIN)
			.and_then(|q| q.checked_add(frac))
			.ok_or_else(invalid)?;
		if quarks == 0 {
			return Err(invalid());
		}
		Ok(Self(quarks))
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}.{:0DECIMALS$}",
			self.0 / QUARKS_PER_KIN,
			self.0 % QUARKS_PER_KIN
		)
	}
}

/// An on-chain account as of the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
	pub public_key: String,
	pub sequence: i64,
	pub balance: Amount,
}

/// The raw payment form inputs, kept verbatim so a transaction can be
/// rebuilt later.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaymentForm {
	pub destination: String,
	pub amount: String,
	pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
	pub source: String,
	pub destination: String,
	pub amount: Amount,
	pub memo: Option<String>,
	pub fee: u32,
	pub sequence: i64,
	pub network_passphrase: String,
}

impl UnsignedTransaction {
	pub fn signature_base(&self) -> Result<Vec<u8>, BackendError> {
		xdr::signature_base(self)
	}

	pub fn hash_hex(&self) -> Result<String, BackendError> {
		Ok(hex::encode(xdr::hash(self)?))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
	pub hint: [u8; 4],
	pub signature: Vec<u8>,
}

impl DecoratedSignature {
	/// Attach the hint (last four public key bytes) to a raw signature.
	pub fn new(public_key: &[u8; 32], signature: Vec<u8>) -> Self {
		let mut hint = [0u8; 4];
		hint.copy_from_slice(&public_key[28..]);
		Self { hint, signature }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
	pub transaction: UnsignedTransaction,
	pub signatures: Vec<DecoratedSignature>,
}

impl SignedTransaction {
	/// Base64 XDR envelope, the form the node accepts.
	pub fn to_base64(&self) -> Result<String, BackendError> {
		Ok(base64::engine::general_purpose::STANDARD.encode(xdr::envelope(self)?))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Confirmation {
	pub hash: String,
	pub ledger: u64,
}

/// Public key and raw form inputs used to rebuild a transaction
/// against fresh account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayContext {
	pub public_key: String,
	pub form: PaymentForm,
}

/// What the device path should sign.
#[derive(Debug, Clone)]
pub enum DeviceSource {
	Unsigned(UnsignedTransaction),
	/// Rebuild from `context` and sign afresh.  `previous` only records
	/// which earlier signature this replaces; it is never read or submitted.
	Replay {
		previous: SignedTransaction,
		context: ReplayContext,
	},
}

#[derive(Debug, Clone)]
pub struct DeviceSigningRequest {
	pub derivation_path: String,
	pub source: DeviceSource,
}

/// What the key-pair path should submit.
#[derive(Debug, Clone)]
pub enum KeyPairSource {
	Unsigned(UnsignedTransaction),
	Signed(SignedTransaction),
}

#[derive(Debug, Clone)]
pub struct KeyPairSigningRequest {
	pub secret: Secret,
	pub source: KeyPairSource,
}

/// A secret seed.  `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
	pub fn new(text: impl Into<String>) -> Self {
		Self(text.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}

	pub fn trimmed(&self) -> Self {
		Self(self.0.trim().to_owned())
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Secret(..)")
	}
}
