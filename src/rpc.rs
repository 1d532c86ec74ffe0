use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BackendError, Problem};
use crate::model::{Account, Amount, Confirmation, PaymentForm, SignedTransaction, UnsignedTransaction};
use crate::tx_builder::{self, NetworkParams};

/// What the orchestrator needs from the network.
#[async_trait::async_trait]
pub trait BlockchainClient: Send + Sync {
	async fn get_account(&self, public_key: &str) -> Result<Account, BackendError>;

	async fn get_unsigned_transaction(
		&self,
		account: &Account,
		form: &PaymentForm,
	) -> Result<UnsignedTransaction, BackendError>;

	async fn submit_transaction(
		&self,
		tx: &SignedTransaction,
	) -> Result<Confirmation, BackendError>;
}

/// Thin wrapper around a Horizon REST endpoint.
///
/// Non-2xx answers become `BackendError::Http` carrying the parsed
/// problem document, so callers can pick either the status text or the
/// problem title for display.
pub struct HorizonClient {
	url: String,
	http: reqwest::Client,
	network: NetworkParams,
}

#[derive(Deserialize)]
struct HorizonAccount {
	id: String,
	sequence: Option<String>,
	#[serde(default)]
	balances: Vec<HorizonBalance>,
}

#[derive(Deserialize)]
struct HorizonBalance {
	balance: String,
	asset_type: String,
}

impl HorizonClient {
	pub fn new(url: &str, network: NetworkParams) -> Self {
		Self {
			url: url.trim_end_matches('/').to_owned(),
			http: reqwest::Client::new(),
			network,
		}
	}

	pub fn network(&self) -> &NetworkParams {
		&self.network
	}

	/// Look up a submitted transaction by hash.
	pub async fn transaction_status(&self, hash: &str) -> Result<Value, BackendError> {
		let hash = hash.strip_prefix("0x").unwrap_or(hash);
		self.get_json(&format!("transactions/{hash}")).await
	}

	async fn get_json(&self, path: &str) -> Result<Value, BackendError> {
		let url = format!("{}/{path}", self.url);
		debug!(%url, "GET");
		let resp = self.http.get(&url).send().await.map_err(network_error)?;
		read_json(resp).await
	}
}

#[async_trait::async_trait]
impl BlockchainClient for HorizonClient {
	async fn get_account(&self, public_key: &str) -> Result<Account, BackendError> {
		let body = self.get_json(&format!("accounts/{}", public_key.trim())).await?;
		let raw: HorizonAccount =
			serde_json::from_value(body).map_err(|_| BackendError::EmptyResponse)?;
		account_from(raw)
	}

	async fn get_unsigned_transaction(
		&self,
		account: &Account,
		form: &PaymentForm,
	) -> Result<UnsignedTransaction, BackendError> {
		let tx = tx_builder::build_payment(account, form, &self.network)?;
		// A payment to an account that does not exist fails on submit;
		// surface the lookup error here instead.
		self.get_account(&tx.destination).await?;
		Ok(tx)
	}

	async fn submit_transaction(
		&self,
		tx: &SignedTransaction,
	) -> Result<Confirmation, BackendError> {
		let envelope = tx.to_base64()?;
		let url = format!("{}/transactions", self.url);
		let resp = self
			.http
			.post(&url)
			.form(&[("tx", envelope.as_str())])
			.send()
			.await
			.map_err(network_error)?;

		let body = read_json(resp).await?;
		let confirmation: Confirmation =
			serde_json::from_value(body).map_err(|_| BackendError::EmptyResponse)?;
		info!(hash = %confirmation.hash, ledger = confirmation.ledger, "transaction submitted");
		Ok(confirmation)
	}
}

// -- Private helpers --

fn network_error(err: reqwest::Error) -> BackendError {
	BackendError::Network(err.to_string())
}

async fn read_json(resp: reqwest::Response) -> Result<Value, BackendError> {
	let status = resp.status();
	if status.is_success() {
		return resp.json().await.map_err(|_| BackendError::EmptyResponse);
	}

	let problem = resp.json::<Problem>().await.ok();
	debug!(status = status.as_u16(), ?problem, "horizon rejected request");
	Err(BackendError::Http {
		status: status.as_u16(),
		problem,
	})
}

fn account_from(raw: HorizonAccount) -> Result<Account, BackendError> {
	let sequence = raw
		.sequence
		.as_deref()
		.and_then(|s| s.parse::<i64>().ok())
		.ok_or(BackendError::EmptyResponse)?;
	let balance = raw
		.balances
		.iter()
		.find(|b| b.asset_type == "native")
		.ok_or(BackendError::EmptyResponse)?;
	let balance = parse_balance(&balance.balance).ok_or(BackendError::EmptyResponse)?;

	Ok(Account {
		public_key: raw.id,
		sequence,
		balance,
	})
}

/// Horizon reports balances with trailing zero padding ("12.5000000");
/// drop digits past quark precision instead of rejecting them.
fn parse_balance(text: &str) -> Option<Amount> {
	let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
	let frac: String = frac.chars().chain(std::iter::repeat('0')).take(5).collect();
	let whole: i64 = whole.parse().ok()?;
	let frac: i64 = frac.parse().ok()?;
	Some(Amount::from_quarks(whole.checked_mul(crate::model::QUARKS_PER_KIN)? + frac))
}
