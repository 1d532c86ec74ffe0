use crate::error::{BackendError, Extraction};
use crate::events::{Event, SessionState};
use crate::model::{
	Confirmation, DeviceSigningRequest, DeviceSource, KeyPairSigningRequest, KeyPairSource,
	PaymentForm, Secret, SignedTransaction, UnsignedTransaction,
};

use super::Context;

/// Probe the device by reading a public key; the key itself is discarded.
pub(super) async fn connect_hardware_device(
	ctx: &Context,
	mut session: SessionState,
	probe_path: &str,
) -> SessionState {
	session.ledger_connected = false;
	ctx.commit(session);
	ctx.publish(Event::LedgerConnected(false));
	ctx.set_loading(true);

	match ctx.device().get_public_key(probe_path.trim()).await {
		Ok(_) => {
			session.ledger_connected = true;
			ctx.commit(session);
			ctx.publish(Event::LedgerConnected(true));
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::Stringified);
		}
	}
	session
}

pub(super) async fn validate_key_pair(
	ctx: &Context,
	mut session: SessionState,
	secret: &Secret,
) -> SessionState {
	session.key_pair_valid = false;
	ctx.commit(session);
	ctx.publish(Event::KeyPairInvalidated);
	ctx.set_loading(true);

	let secret = secret.trimmed();
	match ctx.keys().from_secret(&secret) {
		Ok(key) => {
			session.key_pair_valid = true;
			ctx.commit(session);
			ctx.publish(Event::KeyPairValidated {
				secret,
				public_key: key.public_key().to_owned(),
			});
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::Stringified);
		}
	}
	session
}

pub(super) async fn resolve_public_key(ctx: &Context, derivation_path: &str) {
	ctx.set_loading(true);
	match ctx.device().get_public_key(derivation_path.trim()).await {
		Ok(key) => {
			ctx.publish(Event::PublicKey(key.public_key().to_owned()));
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::Stringified);
		}
	}
}

pub(super) async fn fetch_account(ctx: &Context, public_key: &str) {
	ctx.set_loading(true);
	match ctx.chain().get_account(public_key).await {
		Ok(account) => {
			ctx.publish(Event::Account(account));
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::ResponseTitleOrMessage);
		}
	}
}

/// The account is always fetched again here so the sequence number is
/// current, even if the caller already holds one.
pub(super) async fn build_unsigned_transaction(ctx: &Context, public_key: &str, form: &PaymentForm) {
	ctx.set_loading(true);
	match rebuild(ctx, public_key, form).await {
		Ok(tx) => {
			ctx.publish(Event::UnsignedTransaction(tx));
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::Stringified);
		}
	}
}

/// Loading is raised when the device is asked to sign and left raised on
/// both outcomes; presentation clears it when the submission arrives.
pub(super) async fn sign_with_device(ctx: &Context, request: DeviceSigningRequest) {
	let DeviceSigningRequest { derivation_path, source } = request;
	let path = derivation_path.trim();
	let outcome: Result<Confirmation, BackendError> = async {
		let signed = match source {
			DeviceSource::Unsigned(tx) => sign_on_device(ctx, path, &tx).await?,
			DeviceSource::Replay { context, .. } => {
				let fresh = rebuild(ctx, &context.public_key, &context.form).await?;
				sign_on_device(ctx, path, &fresh).await?
			}
		};
		ctx.publish(Event::TransactionSigned(signed.clone()));
		ctx.chain().submit_transaction(&signed).await
	}
	.await;

	match outcome {
		Ok(confirmation) => ctx.publish(Event::TransactionSubmitted(confirmation)),
		Err(err) => ctx.fail(&err, Extraction::Stringified),
	}
}

/// A pre-signed transaction is submitted as given; only unsigned input is
/// signed here.
pub(super) async fn sign_with_key_pair(ctx: &Context, request: KeyPairSigningRequest) {
	ctx.set_loading(true);
	// Unlike validation, the secret is used exactly as given.
	let KeyPairSigningRequest { secret, source } = request;
	let outcome: Result<Confirmation, BackendError> = async {
		let signed = match source {
			KeyPairSource::Unsigned(tx) => {
				let signed = ctx.keys().sign_transaction(&secret, &tx)?;
				ctx.publish(Event::TransactionSigned(signed.clone()));
				signed
			}
			KeyPairSource::Signed(signed) => signed,
		};
		ctx.publish(Event::KeyPairTransactionSigned(signed.clone()));
		ctx.chain().submit_transaction(&signed).await
	}
	.await;

	match outcome {
		Ok(confirmation) => {
			ctx.publish(Event::TransactionSubmitted(confirmation));
			ctx.set_loading(false);
		}
		Err(err) => {
			ctx.set_loading(false);
			ctx.fail(&err, Extraction::Stringified);
		}
	}
}

async fn rebuild(
	ctx: &Context,
	public_key: &str,
	form: &PaymentForm,
) -> Result<UnsignedTransaction, BackendError> {
	let account = ctx.chain().get_account(public_key).await?;
	ctx.chain().get_unsigned_transaction(&account, form).await
}

async fn sign_on_device(
	ctx: &Context,
	derivation_path: &str,
	tx: &UnsignedTransaction,
) -> Result<SignedTransaction, BackendError> {
	ctx.set_loading(true);
	ctx.device().sign_transaction(derivation_path, tx).await
}
