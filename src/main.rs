use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kinpay_cli::cli::{Cli, Command};
use kinpay_cli::commands;
use kinpay_cli::model::PaymentForm;

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		)
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();

	match &cli.command {
		Command::Signer { command } => commands::signer::run(&cli, command).await,
		Command::Account { public_key } => {
			commands::account::run(&cli, public_key.as_deref()).await
		}
		Command::Pay { to, amount, memo } => {
			let form = PaymentForm {
				destination: to.clone(),
				amount: amount.clone(),
				memo: memo.clone(),
			};
			commands::pay::run(&cli, form).await
		}
		Command::Tx { command } => commands::tx::run(&cli, command).await,
	}
}
