pub mod account;
pub mod pay;
pub mod signer;
pub mod tx;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cli::{Cli, SignerArg};
use crate::config::{Config, SignerMethod};
use crate::events::Event;
use crate::model::Secret;
use crate::orchestrator::Orchestrator;
use crate::rpc::HorizonClient;
use crate::signer::{keypair::LocalKeySigner, ledger_from_config};

/// Environment variable the key-pair method reads its seed from.
pub const SECRET_ENV: &str = "KINPAY_SECRET";

/// Network name from CLI flag or config.
pub fn resolve_network<'a>(cli: &'a Cli, config: &'a Config) -> &'a str {
	match &cli.network {
		Some(network) => network.as_str(),
		None => &config.network.default,
	}
}

/// Resolve the Horizon URL from CLI flag or config.
pub fn resolve_horizon(cli: &Cli, config: &Config) -> String {
	cli.horizon_url
		.clone()
		.unwrap_or_else(|| config.horizon_url(resolve_network(cli, config)).to_owned())
}

pub fn horizon_client(cli: &Cli, config: &Config) -> HorizonClient {
	HorizonClient::new(
		&resolve_horizon(cli, config),
		config.network_params(resolve_network(cli, config)),
	)
}

/// Wire the orchestrator to Horizon, the configured Ledger transport and
/// the local key signer.
pub fn orchestrator(cli: &Cli, config: &Config) -> Orchestrator {
	Orchestrator::new(
		Arc::new(horizon_client(cli, config)),
		ledger_from_config(config),
		Arc::new(LocalKeySigner::new()),
		config.ledger.derivation_path.clone(),
	)
}

/// Signing method from CLI flag or config, failing if neither is set.
pub fn resolve_method(cli: &Cli, config: &Config) -> Result<SignerMethod> {
	match (&cli.signer, &config.signer.method) {
		(Some(SignerArg::Ledger), _) => Ok(SignerMethod::Ledger),
		(Some(SignerArg::Keypair), _) => Ok(SignerMethod::Keypair),
		(None, Some(method)) => Ok(method.clone()),
		(None, None) => anyhow::bail!(
			"No signer configured. Run: kinpay signer set --method <method>"
		),
	}
}

pub fn secret_from_env() -> Result<Secret> {
	std::env::var(SECRET_ENV)
		.map(Secret::new)
		.map_err(|_| anyhow!("Set {SECRET_ENV} to your secret seed (S...)."))
}

/// Start one workflow, print `waiting` when it raises the loading flag,
/// and return every event it published.  A published error becomes the
/// returned error, worded for the user.
pub async fn drive(
	orchestrator: &Orchestrator,
	cli: &Cli,
	waiting: &str,
	start: impl FnOnce(&Orchestrator) -> JoinHandle<()>,
) -> Result<Vec<Event>> {
	let mut rx = orchestrator.subscribe();
	let mut handle = start(orchestrator);
	let mut events = Vec::new();

	loop {
		tokio::select! {
			done = &mut handle => {
				done?;
				break;
			}
			received = rx.recv() => match received {
				Ok(event) => {
					if matches!(event, Event::Loading(true)) && !waiting.is_empty() {
						println!("{waiting}");
					}
					events.push(event);
				}
				Err(RecvError::Lagged(n)) => warn!(skipped = n, "event stream lagged"),
				Err(RecvError::Closed) => break,
			},
		}
	}
	loop {
		match rx.try_recv() {
			Ok(event) => events.push(event),
			Err(TryRecvError::Lagged(n)) => warn!(skipped = n, "event stream lagged"),
			Err(TryRecvError::Empty | TryRecvError::Closed) => break,
		}
	}

	check(&events, cli.verbose_errors)?;
	Ok(events)
}

fn check(events: &[Event], landing: bool) -> Result<()> {
	let Some(reports) = events.iter().find_map(|e| match e {
		Event::Errors(reports) => Some(reports),
		_ => None,
	}) else {
		return Ok(());
	};

	let lines: Vec<String> = reports
		.iter()
		.map(|report| {
			if landing {
				let notice = report.landing();
				if notice.body.is_empty() {
					notice.head
				} else {
					format!("{}\n{}", notice.head, notice.body)
				}
			} else {
				report.alert().message
			}
		})
		.collect();
	Err(anyhow!(lines.join("\n")))
}
