use crc::{Crc, CRC_16_XMODEM};
use data_encoding::BASE32_NOPAD;
use thiserror::Error;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Version byte of an account id (`G...`).
pub const ACCOUNT_ID: u8 = 6 << 3;
/// Version byte of a secret seed (`S...`).
pub const SEED: u8 = 18 << 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrKeyError {
	#[error("invalid encoded string")]
	InvalidEncoding,
	#[error("invalid version byte. expected {expected}, got {got}")]
	InvalidVersion { expected: u8, got: u8 },
	#[error("invalid checksum")]
	InvalidChecksum,
}

/// Encode a 32-byte key as `base32(version || key || crc16_le)`.
pub fn encode(version: u8, key: &[u8; 32]) -> String {
	let mut raw = Vec::with_capacity(35);
	raw.push(version);
	raw.extend_from_slice(key);
	let checksum = CRC16.checksum(&raw);
	raw.extend_from_slice(&checksum.to_le_bytes());
	BASE32_NOPAD.encode(&raw)
}

/// Decode and verify a StrKey, returning its 32-byte payload.
pub fn decode(expected: u8, encoded: &str) -> Result<[u8; 32], StrKeyError> {
	let raw = BASE32_NOPAD
		.decode(encoded.as_bytes())
		.map_err(|_| StrKeyError::InvalidEncoding)?;
	if raw.len() != 35 || BASE32_NOPAD.encode(&raw) != encoded {
		return Err(StrKeyError::InvalidEncoding);
	}

	let got = raw[0];
	if got != expected {
		return Err(StrKeyError::InvalidVersion { expected, got });
	}

	let (body, checksum) = raw.split_at(33);
	if CRC16.checksum(body).to_le_bytes() != checksum {
		return Err(StrKeyError::InvalidChecksum);
	}

	let mut key = [0u8; 32];
	key.copy_from_slice(&body[1..]);
	Ok(key)
}

pub fn encode_account_id(key: &[u8; 32]) -> String {
	encode(ACCOUNT_ID, key)
}

pub fn decode_account_id(encoded: &str) -> Result<[u8; 32], StrKeyError> {
	decode(ACCOUNT_ID, encoded)
}
