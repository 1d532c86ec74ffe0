use std::path::PathBuf;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::signer::KIN_DERIVATION_PATH;
use crate::tx_builder::NetworkParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub network: NetworkConfig,
	pub ledger: LedgerConfig,
	pub signer: SignerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
	pub default: String,
	pub testnet_horizon: String,
	pub mainnet_horizon: String,
	pub testnet_passphrase: String,
	pub mainnet_passphrase: String,
	/// Fee per operation, in quarks.
	pub base_fee: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
	/// Address of the APDU transport (Speculos TCP server).
	pub transport: String,
	pub derivation_path: String,
	pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
	pub method: Option<SignerMethod>,
	pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerMethod {
	Ledger,
	Keypair,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			network: NetworkConfig {
				default: "testnet".into(),
				testnet_horizon: "https://horizon-testnet.kininfrastructure.com".into(),
				mainnet_horizon: "https://horizon.kinfederation.com".into(),
				testnet_passphrase: "Kin Testnet ; December 2018".into(),
				mainnet_passphrase: "Kin Mainnet ; December 2018".into(),
				base_fee: 100,
			},
			ledger: LedgerConfig {
				transport: "127.0.0.1:9999".into(),
				derivation_path: KIN_DERIVATION_PATH.into(),
				timeout_secs: 30,
			},
			signer: SignerConfig {
				method: None,
				public_key: None,
			},
		}
	}
}

impl Config {
	/// Directory where CLI state is stored (~/.kinpay/).
	pub fn dir() -> anyhow::Result<PathBuf> {
		dirs::home_dir()
			.map(|home| home.join(".kinpay"))
			.ok_or_else(|| anyhow!("could not determine home directory"))
	}

	/// Path to the config file.
	pub fn path() -> anyhow::Result<PathBuf> {
		Ok(Self::dir()?.join("config.toml"))
	}

	/// Load config from disk, falling back to defaults if no file exists.
	pub fn load() -> anyhow::Result<Self> {
		let path = Self::path()?;
		if path.exists() {
			let content = std::fs::read_to_string(&path)?;
			Ok(toml::from_str(&content)?)
		} else {
			Ok(Self::default())
		}
	}

	/// Persist the current config to disk, creating the directory if needed.
	pub fn save(&self) -> anyhow::Result<()> {
		let path = Self::path()?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&path, toml::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Return the Horizon URL for the given network name.
	pub fn horizon_url(&self, network: &str) -> &str {
		match network {
			"mainnet" => &self.network.mainnet_horizon,
			_ => &self.network.testnet_horizon,
		}
	}

	/// Return the network passphrase for the given network name.
	pub fn passphrase(&self, network: &str) -> &str {
		match network {
			"mainnet" => &self.network.mainnet_passphrase,
			_ => &self.network.testnet_passphrase,
		}
	}

	pub fn network_params(&self, network: &str) -> NetworkParams {
		NetworkParams {
			passphrase: self.passphrase(network).to_owned(),
			base_fee: self.network.base_fee,
		}
	}
}
