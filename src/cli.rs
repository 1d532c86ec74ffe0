use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
	name = "kinpay",
	about = "Sign and submit Kin payments with a Ledger or a local key pair.",
	version
)]
pub struct Cli {
	/// Network to connect to. Defaults to `network.default` in the config.
	#[arg(long, global = true)]
	pub network: Option<Network>,

	/// Override Horizon endpoint URL.
	#[arg(long, global = true)]
	pub horizon_url: Option<String>,

	/// Override signing method.
	#[arg(long, global = true)]
	pub signer: Option<SignerArg>,

	/// Print errors in the landing-page form (head and body).
	#[arg(long, global = true)]
	pub verbose_errors: bool,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Clone, ValueEnum)]
pub enum Network {
	Testnet,
	Mainnet,
}

impl Network {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Testnet => "testnet",
			Self::Mainnet => "mainnet",
		}
	}
}

#[derive(Clone, ValueEnum)]
pub enum SignerArg {
	Ledger,
	Keypair,
}

#[derive(Subcommand)]
pub enum Command {
	/// Manage the signing backend.
	Signer {
		#[command(subcommand)]
		command: SignerCommand,
	},

	/// Show balance and sequence of an account.
	Account {
		/// Account id (G...). Defaults to the connected signer's key.
		public_key: Option<String>,
	},

	/// Build, sign and submit a payment.
	Pay {
		/// Destination account id (G...).
		#[arg(long)]
		to: String,

		/// Amount in KIN, up to 5 decimals.
		#[arg(long)]
		amount: String,

		/// Optional text memo (up to 28 bytes).
		#[arg(long)]
		memo: Option<String>,
	},

	/// Check transaction status on-chain.
	Tx {
		#[command(subcommand)]
		command: TxCommand,
	},
}

// -- Signer subcommands --

#[derive(Subcommand)]
pub enum SignerCommand {
	/// Set the default signing method.
	Set {
		/// Signing method to use.
		#[arg(long)]
		method: SignerArg,
	},

	/// Check the signer and store its public key.  The key-pair method
	/// reads the secret seed from $KINPAY_SECRET.
	Connect {
		/// Ledger derivation path; defaults to the configured one.
		#[arg(long)]
		path: Option<String>,
	},

	/// Show current signer configuration.
	Status,
}

// -- Tx subcommands --

#[derive(Subcommand)]
pub enum TxCommand {
	/// Check the status of a submitted transaction.
	Status {
		/// Transaction hash (hex).
		tx_hash: String,
	},
}
