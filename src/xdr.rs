//! XDR encoding of the one transaction shape this client produces: a
//! single native-asset payment with an optional text memo.

use sha2::{Digest, Sha256};

use crate::error::BackendError;
use crate::model::{DecoratedSignature, SignedTransaction, UnsignedTransaction};
use crate::strkey;

const KEY_TYPE_ED25519: i32 = 0;
const MEMO_NONE: i32 = 0;
const MEMO_TEXT: i32 = 1;
const PAYMENT: i32 = 1;
const ASSET_TYPE_NATIVE: i32 = 0;
const ENVELOPE_TYPE_TX: i32 = 2;

/// Longest memo text the protocol accepts, in bytes.
pub const MAX_MEMO_BYTES: usize = 28;

#[derive(Default)]
struct XdrWriter {
	buf: Vec<u8>,
}

impl XdrWriter {
	fn int(&mut self, v: i32) {
		self.buf.extend_from_slice(&v.to_be_bytes());
	}

	fn uint(&mut self, v: u32) {
		self.buf.extend_from_slice(&v.to_be_bytes());
	}

	fn hyper(&mut self, v: i64) {
		self.buf.extend_from_slice(&v.to_be_bytes());
	}

	fn fixed(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
		let pad = (4 - bytes.len() % 4) % 4;
		self.buf.extend(std::iter::repeat(0u8).take(pad));
	}

	fn var(&mut self, bytes: &[u8]) {
		self.uint(bytes.len() as u32);
		self.fixed(bytes);
	}

	fn account(&mut self, key: &[u8; 32]) {
		self.int(KEY_TYPE_ED25519);
		self.fixed(key);
	}
}

/// Network id: SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
	Sha256::digest(passphrase.as_bytes()).into()
}

/// Encode the transaction body.
pub fn transaction(tx: &UnsignedTransaction) -> Result<Vec<u8>, BackendError> {
	let source = strkey::decode_account_id(&tx.source)?;
	let destination = strkey::decode_account_id(&tx.destination)?;

	let mut w = XdrWriter::default();
	w.account(&source);
	w.uint(tx.fee);
	w.hyper(tx.sequence);
	// no time bounds
	w.uint(0);

	match tx.memo.as_deref() {
		Some(text) if !text.is_empty() => {
			if text.len() > MAX_MEMO_BYTES {
				return Err(BackendError::invalid(format!(
					"memo is longer than {MAX_MEMO_BYTES} bytes"
				)));
			}
			w.int(MEMO_TEXT);
			w.var(text.as_bytes());
		}
		_ => w.int(MEMO_NONE),
	}

	// one operation, inheriting the transaction source
	w.uint(1);
	w.uint(0);
	w.int(PAYMENT);
	w.account(&destination);
	w.int(ASSET_TYPE_NATIVE);
	w.hyper(tx.amount.quarks());

	// ext
	w.int(0);
	Ok(w.buf)
}

/// The bytes a signer commits to: `network_id || ENVELOPE_TYPE_TX || tx`.
pub fn signature_base(tx: &UnsignedTransaction) -> Result<Vec<u8>, BackendError> {
	let mut w = XdrWriter::default();
	w.fixed(&network_id(&tx.network_passphrase));
	w.int(ENVELOPE_TYPE_TX);
	let mut base = w.buf;
	base.extend(transaction(tx)?);
	Ok(base)
}

/// Transaction hash, the SHA-256 of the signature base.
pub fn hash(tx: &UnsignedTransaction) -> Result<[u8; 32], BackendError> {
	Ok(Sha256::digest(signature_base(tx)?).into())
}

/// Encode the full envelope: transaction followed by its signatures.
pub fn envelope(signed: &SignedTransaction) -> Result<Vec<u8>, BackendError> {
	let mut out = transaction(&signed.transaction)?;
	let mut w = XdrWriter::default();
	w.uint(signed.signatures.len() as u32);
	for DecoratedSignature { hint, signature } in &signed.signatures {
		w.fixed(hint);
		w.var(signature);
	}
	out.extend(w.buf);
	Ok(out)
}
