use anyhow::{anyhow, Result};

use crate::cli::{Cli, SignerArg, SignerCommand};
use crate::commands::{drive, orchestrator, resolve_method, resolve_network, secret_from_env};
use crate::config::{Config, SignerMethod};
use crate::events::Event;
use crate::signer::method_label;

pub async fn run(cli: &Cli, cmd: &SignerCommand) -> Result<()> {
	match cmd {
		SignerCommand::Set { method } => set_method(method),
		SignerCommand::Connect { path } => connect(cli, path.as_deref()).await,
		SignerCommand::Status => show_status(cli),
	}
}

fn set_method(method: &SignerArg) -> Result<()> {
	let sm = match method {
		SignerArg::Ledger => SignerMethod::Ledger,
		SignerArg::Keypair => SignerMethod::Keypair,
	};
	let label = method_label(&sm);

	let mut config = Config::load()?;
	config.signer.method = Some(sm);
	config.signer.public_key = None;
	config.save()?;
	println!("Signer method set to: {label}");
	Ok(())
}

async fn connect(cli: &Cli, path: Option<&str>) -> Result<()> {
	let mut config = Config::load()?;
	let method = resolve_method(cli, &config)?;
	let orch = orchestrator(cli, &config);

	let public_key = match method {
		SignerMethod::Ledger => {
			println!("Checking Ledger device...");
			drive(&orch, cli, "", |o| o.connect_hardware_device()).await?;
			if !orch.session().borrow().ledger_connected {
				anyhow::bail!("Ledger device did not respond.");
			}

			let path = path.unwrap_or(&config.ledger.derivation_path).to_owned();
			let events = drive(&orch, cli, "", |o| o.resolve_public_key(path)).await?;
			events
				.into_iter()
				.find_map(|e| match e {
					Event::PublicKey(key) => Some(key),
					_ => None,
				})
				.ok_or_else(|| anyhow!("device returned no public key"))?
		}
		SignerMethod::Keypair => {
			let secret = secret_from_env()?;
			let events = drive(&orch, cli, "", |o| o.validate_key_pair(secret)).await?;
			events
				.into_iter()
				.find_map(|e| match e {
					Event::KeyPairValidated { public_key, .. } => Some(public_key),
					_ => None,
				})
				.ok_or_else(|| anyhow!("secret seed was not accepted"))?
		}
	};

	println!("Connected: {public_key}");

	config.signer.method = Some(method);
	config.signer.public_key = Some(public_key);
	config.save()?;
	println!("Public key saved to config.");

	Ok(())
}

fn show_status(cli: &Cli) -> Result<()> {
	let config = Config::load()?;
	let network = resolve_network(cli, &config);

	let method = config
		.signer
		.method
		.as_ref()
		.map(method_label)
		.unwrap_or("not set");

	let public_key = config
		.signer
		.public_key
		.as_deref()
		.unwrap_or("not connected");

	println!("Signer");
	println!("  Method:     {method}");
	println!("  Public key: {public_key}");
	println!("  Network:    {network}");
	println!("  Horizon:    {}", config.horizon_url(network));
	println!("  Ledger:     {} ({})", config.ledger.transport, config.ledger.derivation_path);
	Ok(())
}
