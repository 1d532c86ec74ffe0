use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::cli::{Cli, TxCommand};
use crate::commands::horizon_client;
use crate::config::Config;
use crate::error::BackendError;

pub async fn run(cli: &Cli, cmd: &TxCommand) -> Result<()> {
	let config = Config::load()?;
	let horizon = horizon_client(cli, &config);

	match cmd {
		TxCommand::Status { tx_hash } => {
			let info = match horizon.transaction_status(tx_hash).await {
				Ok(info) => info,
				Err(BackendError::Http { status: 404, .. }) => {
					println!("Transaction not found: {tx_hash}");
					return Ok(());
				}
				Err(err) => return Err(err.into()),
			};

			let successful = info.get("successful").and_then(|v| v.as_bool());
			println!("Transaction: {tx_hash}");
			match successful {
				Some(true) => println!("Status:      successful"),
				Some(false) => println!("Status:      failed"),
				None => println!("Status:      unknown"),
			}
			if let Some(ledger) = info.get("ledger").and_then(|v| v.as_u64()) {
				println!("Ledger:      {ledger}");
			}
			let created = info
				.get("created_at")
				.and_then(|v| v.as_str())
				.and_then(|s| s.parse::<DateTime<Utc>>().ok());
			if let Some(created) = created {
				println!("Closed at:   {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
			}
			Ok(())
		}
	}
}
