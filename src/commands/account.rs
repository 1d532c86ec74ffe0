use anyhow::{anyhow, Result};

use crate::cli::Cli;
use crate::commands::{drive, orchestrator};
use crate::config::Config;
use crate::events::Event;

pub async fn run(cli: &Cli, public_key: Option<&str>) -> Result<()> {
	let config = Config::load()?;
	let public_key = public_key
		.or(config.signer.public_key.as_deref())
		.ok_or_else(|| anyhow!("No public key given or configured. Run: kinpay signer connect"))?
		.to_owned();

	let orch = orchestrator(cli, &config);
	let events = drive(&orch, cli, "", |o| o.fetch_account(public_key)).await?;

	for event in events {
		if let Event::Account(account) = event {
			println!("Account:  {}", account.public_key);
			println!("Balance:  {} KIN", account.balance);
			println!("Sequence: {}", account.sequence);
		}
	}
	Ok(())
}
