use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{BackendError, DeviceError};
use crate::model::{DecoratedSignature, SignedTransaction, UnsignedTransaction};
use crate::strkey;

use super::{HardwareSigner, KeyHandle};

const CLA: u8 = 0xe0;
const INS_GET_PK: u8 = 0x02;
const INS_SIGN_TX: u8 = 0x04;
const P1_FIRST: u8 = 0x00;
const P1_MORE: u8 = 0x80;
const P2_LAST: u8 = 0x00;
const P2_MORE: u8 = 0x80;
const SW_OK: u16 = 0x9000;
const CHUNK_SIZE: usize = 150;
const HARDENED: u32 = 0x8000_0000;

/// Moves one APDU to the device and returns the response data and
/// status word, in that order, exactly as the device sent them.
#[async_trait::async_trait]
pub trait ApduTransport: Send + Sync {
	async fn exchange(&self, apdu: &[u8]) -> Result<Vec<u8>, DeviceError>;
}

/// Talks to the Kin app on a Ledger through an APDU transport.
pub struct LedgerSigner<T> {
	transport: T,
}

impl<T: ApduTransport> LedgerSigner<T> {
	pub fn new(transport: T) -> Self {
		Self { transport }
	}

	async fn send(&self, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Vec<u8>, DeviceError> {
		let mut apdu = Vec::with_capacity(5 + data.len());
		apdu.extend_from_slice(&[CLA, ins, p1, p2, data.len() as u8]);
		apdu.extend_from_slice(data);

		let mut response = self.transport.exchange(&apdu).await?;
		if response.len() < 2 {
			return Err(DeviceError::Ineligible);
		}
		let sw_bytes = response.split_off(response.len() - 2);
		let sw = u16::from_be_bytes([sw_bytes[0], sw_bytes[1]]);
		if sw != SW_OK {
			debug!(ins, sw, "device rejected apdu");
			return Err(DeviceError::Status(sw));
		}
		Ok(response)
	}
}

#[async_trait::async_trait]
impl<T: ApduTransport> HardwareSigner for LedgerSigner<T> {
	async fn get_public_key(&self, derivation_path: &str) -> Result<KeyHandle, BackendError> {
		let path = encode_path(derivation_path)?;
		let data = self.send(INS_GET_PK, 0x00, 0x00, &path).await?;
		let key: [u8; 32] = data
			.get(..32)
			.and_then(|k| k.try_into().ok())
			.ok_or(DeviceError::Ineligible)?;
		Ok(KeyHandle::new(strkey::encode_account_id(&key)))
	}

	async fn sign_transaction(
		&self,
		derivation_path: &str,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, BackendError> {
		let path = encode_path(derivation_path)?;
		let mut payload = path;
		payload.extend(tx.signature_base()?);

		let chunks: Vec<&[u8]> = payload.chunks(CHUNK_SIZE).collect();
		let mut signature = Vec::new();
		for (i, chunk) in chunks.iter().enumerate() {
			let p1 = if i == 0 { P1_FIRST } else { P1_MORE };
			let p2 = if i + 1 == chunks.len() { P2_LAST } else { P2_MORE };
			signature = self.send(INS_SIGN_TX, p1, p2, chunk).await?;
		}
		if signature.len() != 64 {
			return Err(DeviceError::Ineligible.into());
		}

		let source = strkey::decode_account_id(&tx.source)?;
		Ok(SignedTransaction {
			transaction: tx.clone(),
			signatures: vec![DecoratedSignature::new(&source, signature)],
		})
	}
}

/// Serialize `44'/2017'/0'` as a count byte followed by big-endian indices.
pub fn encode_path(path: &str) -> Result<Vec<u8>, BackendError> {
	let invalid = || BackendError::invalid(format!("invalid derivation path: {path}"));
	let parts: Vec<&str> = path
		.trim()
		.trim_start_matches("m/")
		.split('/')
		.collect();
	if parts.is_empty() || parts.len() > 10 {
		return Err(invalid());
	}

	let mut out = vec![parts.len() as u8];
	for part in parts {
		let (digits, hardened) = match part.strip_suffix('\'') {
			Some(d) => (d, true),
			None => (part, false),
		};
		let index: u32 = digits.parse().map_err(|_| invalid())?;
		if index >= HARDENED {
			return Err(invalid());
		}
		let index = if hardened { index | HARDENED } else { index };
		out.extend_from_slice(&index.to_be_bytes());
	}
	Ok(out)
}

/// APDU transport for the Speculos emulator's TCP server.
///
/// Request framing is `u32be length || apdu`; the response is
/// `u32be length || data || sw`, where the length excludes the status word.
pub struct SpeculosTransport {
	addr: String,
	timeout: Duration,
}

impl SpeculosTransport {
	pub fn new(addr: String, timeout: Duration) -> Self {
		Self { addr, timeout }
	}

	async fn round_trip(&self, apdu: &[u8]) -> Result<Vec<u8>, DeviceError> {
		let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
			debug!(addr = %self.addr, error = %e, "device transport unreachable");
			DeviceError::Ineligible
		})?;

		let io = |e: std::io::Error| {
			debug!(error = %e, "device transport failed mid-exchange");
			DeviceError::Ineligible
		};
		stream.write_all(&(apdu.len() as u32).to_be_bytes()).await.map_err(io)?;
		stream.write_all(apdu).await.map_err(io)?;

		let mut len = [0u8; 4];
		stream.read_exact(&mut len).await.map_err(io)?;
		let mut response = vec![0u8; u32::from_be_bytes(len) as usize + 2];
		stream.read_exact(&mut response).await.map_err(io)?;
		Ok(response)
	}
}

#[async_trait::async_trait]
impl ApduTransport for SpeculosTransport {
	async fn exchange(&self, apdu: &[u8]) -> Result<Vec<u8>, DeviceError> {
		tokio::time::timeout(self.timeout, self.round_trip(apdu))
			.await
			.map_err(|_| DeviceError::Timeout)?
	}
}
