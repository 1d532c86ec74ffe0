use crate::error::BackendError;
use crate::model::{Account, Amount, PaymentForm, UnsignedTransaction};
use crate::strkey;
use crate::xdr::MAX_MEMO_BYTES;

/// Network-wide parameters every transaction is built against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
	pub passphrase: String,
	pub base_fee: u32,
}

/// Check a payment form before anything is sent to the node.
///
/// The destination is validated first so that a mistyped address is
/// reported ahead of a bad amount.
pub fn validate_form(form: &PaymentForm) -> Result<(String, Amount, Option<String>), BackendError> {
	let destination = form.destination.trim().to_owned();
	strkey::decode_account_id(&destination)?;

	let amount = Amount::parse_kin(&form.amount)?;

	let memo = form
		.memo
		.as_deref()
		.map(str::trim)
		.filter(|m| !m.is_empty())
		.map(str::to_owned);
	if let Some(m) = &memo {
		if m.len() > MAX_MEMO_BYTES {
			return Err(BackendError::invalid(format!(
				"memo is longer than {MAX_MEMO_BYTES} bytes"
			)));
		}
	}

	Ok((destination, amount, memo))
}

/// Build an unsigned single-payment transaction from `source`.
///
/// The sequence number is taken from `source`, so the account must have
/// been fetched right before this call.
pub fn build_payment(
	source: &Account,
	form: &PaymentForm,
	network: &NetworkParams,
) -> Result<UnsignedTransaction, BackendError> {
	let (destination, amount, memo) = validate_form(form)?;
	let sequence = source
		.sequence
		.checked_add(1)
		.ok_or_else(|| BackendError::invalid("account sequence exhausted"))?;

	Ok(UnsignedTransaction {
		source: source.public_key.clone(),
		destination,
		amount,
		memo,
		fee: network.base_fee,
		sequence,
		network_passphrase: network.passphrase.clone(),
	})
}
