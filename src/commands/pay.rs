use anyhow::{anyhow, Result};

use crate::cli::Cli;
use crate::commands::{drive, orchestrator, resolve_method, secret_from_env};
use crate::config::{Config, SignerMethod};
use crate::events::Event;
use crate::model::{
	DeviceSigningRequest, DeviceSource, KeyPairSigningRequest, KeyPairSource, PaymentForm,
};

pub async fn run(cli: &Cli, form: PaymentForm) -> Result<()> {
	let config = Config::load()?;
	let method = resolve_method(cli, &config)?;
	let public_key = config
		.signer
		.public_key
		.clone()
		.ok_or_else(|| anyhow!("No public key configured. Run: kinpay signer connect"))?;
	// Read the seed before touching the network so a missing variable
	// fails fast.
	let secret = match method {
		SignerMethod::Keypair => Some(secret_from_env()?),
		SignerMethod::Ledger => None,
	};

	let orch = orchestrator(cli, &config);
	let events = drive(&orch, cli, "", |o| {
		o.build_unsigned_transaction(public_key, form)
	})
	.await?;
	let unsigned = events
		.into_iter()
		.find_map(|e| match e {
			Event::UnsignedTransaction(tx) => Some(tx),
			_ => None,
		})
		.ok_or_else(|| anyhow!("no transaction was built"))?;

	println!("From:     {}", unsigned.source);
	println!("To:       {}", unsigned.destination);
	println!("Amount:   {} KIN", unsigned.amount);
	println!("Fee:      {} quarks", unsigned.fee);
	if let Some(memo) = &unsigned.memo {
		println!("Memo:     {memo}");
	}
	println!("Sequence: {}", unsigned.sequence);
	println!("Hash:     {}", unsigned.hash_hex()?);

	let events = match secret {
		None => {
			let request = DeviceSigningRequest {
				derivation_path: config.ledger.derivation_path.clone(),
				source: DeviceSource::Unsigned(unsigned),
			};
			drive(&orch, cli, "Confirm the payment on your Ledger device...", |o| {
				o.sign_with_device(request)
			})
			.await?
		}
		Some(secret) => {
			let request = KeyPairSigningRequest {
				secret,
				source: KeyPairSource::Unsigned(unsigned),
			};
			drive(&orch, cli, "Signing and submitting...", |o| {
				o.sign_with_key_pair(request)
			})
			.await?
		}
	};

	let confirmation = events
		.into_iter()
		.find_map(|e| match e {
			Event::TransactionSubmitted(c) => Some(c),
			_ => None,
		})
		.ok_or_else(|| anyhow!("transaction was not submitted"))?;

	println!("Payment submitted.");
	println!("TX:     {}", confirmation.hash);
	println!("Ledger: {}", confirmation.ledger);
	Ok(())
}
