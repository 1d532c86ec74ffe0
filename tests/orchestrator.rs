//! Workflow behavior of the orchestrator against in-memory collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use kinpay_cli::error::{BackendError, DeviceError, Problem};
use kinpay_cli::events::Event;
use kinpay_cli::model::{
	Account, Amount, Confirmation, DecoratedSignature, DeviceSigningRequest, DeviceSource,
	KeyPairSigningRequest, KeyPairSource, PaymentForm, ReplayContext, Secret, SignedTransaction,
	UnsignedTransaction,
};
use kinpay_cli::orchestrator::Orchestrator;
use kinpay_cli::rpc::BlockchainClient;
use kinpay_cli::signer::keypair::LocalKeySigner;
use kinpay_cli::signer::{HardwareSigner, KeyHandle, KeyPairSigner};
use kinpay_cli::strkey;
use kinpay_cli::tx_builder::{build_payment, NetworkParams};

const PATH: &str = "44'/2017'/0'";
const GATED_PATH: &str = "gated";

type Log = Arc<Mutex<Vec<String>>>;

fn source_key() -> String {
	strkey::encode_account_id(&[1u8; 32])
}

fn destination_key() -> String {
	strkey::encode_account_id(&[2u8; 32])
}

fn seed() -> String {
	strkey::encode(strkey::SEED, &[3u8; 32])
}

fn form() -> PaymentForm {
	PaymentForm {
		destination: destination_key(),
		amount: "2.5".into(),
		memo: Some("rent".into()),
	}
}

fn network() -> NetworkParams {
	NetworkParams {
		passphrase: "Kin Testnet ; December 2018".into(),
		base_fee: 100,
	}
}

struct MockChain {
	log: Log,
	sequence: AtomicI64,
	known: Mutex<HashSet<String>>,
	account_failure: Mutex<Option<BackendError>>,
}

impl MockChain {
	fn new(log: Log) -> Self {
		Self {
			log,
			sequence: AtomicI64::new(10),
			known: Mutex::new([source_key(), destination_key()].into_iter().collect()),
			account_failure: Mutex::new(None),
		}
	}

	fn fail_accounts_with(&self, err: BackendError) {
		*self.account_failure.lock().unwrap() = Some(err);
	}
}

#[async_trait::async_trait]
impl BlockchainClient for MockChain {
	async fn get_account(&self, public_key: &str) -> Result<Account, BackendError> {
		self.log.lock().unwrap().push(format!("get_account {public_key}"));
		if let Some(err) = self.account_failure.lock().unwrap().take() {
			return Err(err);
		}
		Ok(Account {
			public_key: public_key.to_owned(),
			sequence: self.sequence.load(Ordering::SeqCst),
			balance: Amount::from_quarks(1_000_000),
		})
	}

	async fn get_unsigned_transaction(
		&self,
		account: &Account,
		form: &PaymentForm,
	) -> Result<UnsignedTransaction, BackendError> {
		self.log.lock().unwrap().push("build".into());
		let tx = build_payment(account, form, &network())?;
		if !self.known.lock().unwrap().contains(&tx.destination) {
			return Err(BackendError::Http {
				status: 404,
				problem: None,
			});
		}
		Ok(tx)
	}

	async fn submit_transaction(
		&self,
		tx: &SignedTransaction,
	) -> Result<Confirmation, BackendError> {
		self.log
			.lock()
			.unwrap()
			.push(format!("submit {}", tx.transaction.sequence));
		Ok(Confirmation {
			hash: tx.transaction.hash_hex()?,
			ledger: 7,
		})
	}
}

struct MockDevice {
	log: Log,
	gate: Arc<Notify>,
	fail: AtomicBool,
}

impl MockDevice {
	fn new(log: Log) -> Self {
		Self {
			log,
			gate: Arc::new(Notify::new()),
			fail: AtomicBool::new(false),
		}
	}

	fn key_for(path: &str) -> String {
		if path == GATED_PATH {
			strkey::encode_account_id(&[9u8; 32])
		} else {
			source_key()
		}
	}
}

#[async_trait::async_trait]
impl HardwareSigner for MockDevice {
	async fn get_public_key(&self, derivation_path: &str) -> Result<KeyHandle, BackendError> {
		self.log.lock().unwrap().push(format!("get_public_key {derivation_path}"));
		// The outcome is fixed when the call starts, so two overlapping
		// calls can be told apart.
		let fail = self.fail.load(Ordering::SeqCst);
		if derivation_path == GATED_PATH {
			self.gate.notified().await;
		}
		if fail {
			return Err(DeviceError::Ineligible.into());
		}
		Ok(KeyHandle::new(Self::key_for(derivation_path)))
	}

	async fn sign_transaction(
		&self,
		derivation_path: &str,
		tx: &UnsignedTransaction,
	) -> Result<SignedTransaction, BackendError> {
		self.log
			.lock()
			.unwrap()
			.push(format!("sign {derivation_path} {}", tx.sequence));
		if self.fail.load(Ordering::SeqCst) {
			return Err(DeviceError::Timeout.into());
		}
		Ok(SignedTransaction {
			transaction: tx.clone(),
			signatures: vec![DecoratedSignature::new(&[1u8; 32], vec![0u8; 64])],
		})
	}
}

struct Harness {
	log: Log,
	chain: Arc<MockChain>,
	device: Arc<MockDevice>,
	orch: Orchestrator,
}

fn harness() -> Harness {
	harness_probing(PATH)
}

fn harness_probing(probe_path: &str) -> Harness {
	let log: Log = Arc::default();
	let chain = Arc::new(MockChain::new(Arc::clone(&log)));
	let device = Arc::new(MockDevice::new(Arc::clone(&log)));
	let orch = Orchestrator::new(
		chain.clone(),
		device.clone(),
		Arc::new(LocalKeySigner::new()),
		probe_path,
	);
	Harness {
		log,
		chain,
		device,
		orch,
	}
}

impl Harness {
	/// Run one workflow to completion and return what it published.
	async fn run(&self, start: impl FnOnce(&Orchestrator) -> JoinHandle<()>) -> Vec<Event> {
		let mut rx = self.orch.subscribe();
		start(&self.orch).await.expect("workflow task failed");
		let mut events = Vec::new();
		while let Ok(event) = rx.try_recv() {
			events.push(event);
		}
		events
	}

	fn calls(&self) -> Vec<String> {
		self.log.lock().unwrap().clone()
	}

	/// Yield until `n` device calls are parked on the gate.
	async fn parked(&self, n: usize) {
		while self.calls().iter().filter(|c| c.ends_with(GATED_PATH)).count() < n {
			tokio::task::yield_now().await;
		}
	}
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
	let mut events = Vec::new();
	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}
	events
}

fn errors(events: &[Event]) -> Vec<String> {
	events
		.iter()
		.filter_map(|e| match e {
			Event::Errors(reports) => Some(reports.iter().map(|r| r.raw().to_owned())),
			_ => None,
		})
		.flatten()
		.collect()
}

fn last_loading(events: &[Event]) -> Option<bool> {
	events.iter().rev().find_map(|e| match e {
		Event::Loading(on) => Some(*on),
		_ => None,
	})
}

fn unsigned(sequence: i64) -> UnsignedTransaction {
	let account = Account {
		public_key: source_key(),
		sequence: sequence - 1,
		balance: Amount::from_quarks(0),
	};
	build_payment(&account, &form(), &network()).unwrap()
}

#[tokio::test]
async fn superseded_invocation_never_publishes() {
	let h = harness();
	let mut rx = h.orch.subscribe();

	let first = h.orch.resolve_public_key(GATED_PATH);
	tokio::task::yield_now().await;
	let second = h.orch.resolve_public_key(PATH);

	second.await.unwrap();
	// Releasing the gate must not revive the superseded call.
	h.device.gate.notify_waiters();
	let first = first.await;
	assert!(first.map_err(|e| e.is_cancelled()).unwrap_err());

	let mut keys = Vec::new();
	while let Ok(event) = rx.try_recv() {
		if let Event::PublicKey(key) = event {
			keys.push(key);
		}
	}
	assert_eq!(keys, vec![source_key()]);
}

#[tokio::test]
async fn superseded_failure_is_never_published() {
	let h = harness();
	let mut rx = h.orch.subscribe();

	h.device.fail.store(true, Ordering::SeqCst);
	let first = h.orch.resolve_public_key(GATED_PATH);
	h.parked(1).await;
	h.device.fail.store(false, Ordering::SeqCst);
	let second = h.orch.resolve_public_key(GATED_PATH);
	h.parked(2).await;

	h.device.gate.notify_waiters();
	second.await.unwrap();
	assert!(first.await.unwrap_err().is_cancelled());

	let events = drain(&mut rx);
	assert!(errors(&events).is_empty());
	assert!(events.iter().any(|e| matches!(e, Event::PublicKey(_))));
}

#[tokio::test]
async fn superseded_connect_does_not_commit() {
	let h = harness_probing(GATED_PATH);
	let mut rx = h.orch.subscribe();

	let first = h.orch.connect_hardware_device();
	h.parked(1).await;
	h.device.fail.store(true, Ordering::SeqCst);
	let second = h.orch.connect_hardware_device();
	h.parked(2).await;

	h.device.gate.notify_waiters();
	second.await.unwrap();
	assert!(first.await.unwrap_err().is_cancelled());

	let events = drain(&mut rx);
	assert!(!h.orch.session().borrow().ledger_connected);
	assert!(!events.iter().any(|e| matches!(e, Event::LedgerConnected(true))));
	assert_eq!(
		errors(&events),
		vec!["Failed to sign with Ledger device: U2F DEVICE_INELIGIBLE"]
	);
	assert_eq!(last_loading(&events), Some(false));
}

#[tokio::test]
async fn connect_keeps_concurrent_key_pair_validation() {
	let h = harness_probing(GATED_PATH);

	let connect = h.orch.connect_hardware_device();
	h.parked(1).await;
	h.run(|o| o.validate_key_pair(Secret::new(seed()))).await;
	assert!(h.orch.session().borrow().key_pair_valid);

	h.device.gate.notify_waiters();
	connect.await.unwrap();

	let session = *h.orch.session().borrow();
	assert!(session.ledger_connected);
	assert!(session.key_pair_valid);
}

#[tokio::test]
async fn validation_keeps_concurrent_device_connection() {
	let h = harness();
	h.run(|o| o.connect_hardware_device()).await;

	h.run(|o| o.validate_key_pair(Secret::new("not a seed"))).await;

	let session = *h.orch.session().borrow();
	assert!(session.ledger_connected);
	assert!(!session.key_pair_valid);
}

#[tokio::test]
async fn different_intents_run_side_by_side() {
	let h = harness();
	let mut rx = h.orch.subscribe();

	let resolve = h.orch.resolve_public_key(GATED_PATH);
	h.orch.fetch_account(source_key()).await.unwrap();
	// Wait until the gated call is parked before releasing it.
	while !h.calls().iter().any(|c| c.ends_with(GATED_PATH)) {
		tokio::task::yield_now().await;
	}
	h.device.gate.notify_waiters();
	resolve.await.unwrap();

	let mut saw_account = false;
	let mut saw_key = false;
	while let Ok(event) = rx.try_recv() {
		match event {
			Event::Account(_) => saw_account = true,
			Event::PublicKey(_) => saw_key = true,
			_ => {}
		}
	}
	assert!(saw_account && saw_key);
}

#[tokio::test]
async fn connect_resets_flag_before_probing() {
	let h = harness();

	let events = h.run(|o| o.connect_hardware_device()).await;
	assert!(matches!(events[0], Event::LedgerConnected(false)));
	assert!(events.iter().any(|e| matches!(e, Event::LedgerConnected(true))));
	assert!(h.orch.session().borrow().ledger_connected);
	assert_eq!(h.calls(), vec![format!("get_public_key {PATH}")]);

	h.device.fail.store(true, Ordering::SeqCst);
	let events = h.run(|o| o.connect_hardware_device()).await;
	assert!(matches!(events[0], Event::LedgerConnected(false)));
	assert!(!events.iter().any(|e| matches!(e, Event::LedgerConnected(true))));
	assert!(!h.orch.session().borrow().ledger_connected);
	assert_eq!(
		errors(&events),
		vec!["Failed to sign with Ledger device: U2F DEVICE_INELIGIBLE"]
	);
	assert_eq!(last_loading(&events), Some(false));
}

#[tokio::test]
async fn key_pair_validation_trims_secret() {
	let h = harness();
	let expected = LocalKeySigner::new()
		.from_secret(&Secret::new(seed()))
		.unwrap();

	let events = h
		.run(|o| o.validate_key_pair(Secret::new(format!("  {}\n", seed()))))
		.await;
	assert!(matches!(events[0], Event::KeyPairInvalidated));
	let validated = events.iter().find_map(|e| match e {
		Event::KeyPairValidated { secret, public_key } => Some((secret.clone(), public_key.clone())),
		_ => None,
	});
	assert_eq!(
		validated,
		Some((Secret::new(seed()), expected.public_key().to_owned()))
	);
	assert!(h.orch.session().borrow().key_pair_valid);
	// Device state is untouched.
	assert!(!h.orch.session().borrow().ledger_connected);
}

#[tokio::test]
async fn invalid_secret_clears_validity() {
	let h = harness();
	h.run(|o| o.validate_key_pair(Secret::new(seed()))).await;

	let events = h.run(|o| o.validate_key_pair(Secret::new("not a seed"))).await;
	assert!(matches!(events[0], Event::KeyPairInvalidated));
	assert_eq!(errors(&events), vec!["Error: invalid encoded string"]);
	assert!(!h.orch.session().borrow().key_pair_valid);
}

#[tokio::test]
async fn fetch_account_reports_problem_title() {
	let h = harness();
	h.chain.fail_accounts_with(BackendError::Http {
		status: 404,
		problem: Some(Problem {
			kind: Some("https://stellar.org/horizon-errors/not_found".into()),
			title: Some("Resource Missing".into()),
			status: Some(404),
			detail: None,
		}),
	});

	let events = h.run(|o| o.fetch_account(source_key())).await;
	let raw = errors(&events);
	assert_eq!(raw, vec!["Resource Missing"]);

	let Some(Event::Errors(reports)) = events.iter().find(|e| matches!(e, Event::Errors(_))) else {
		panic!("no error published");
	};
	assert_eq!(reports[0].alert().message, "Account is missing or does not exist.");
	assert_eq!(last_loading(&events), Some(false));
}

#[tokio::test]
async fn fetch_account_without_body_uses_bare_message() {
	let h = harness();
	h.chain.fail_accounts_with(BackendError::Network("connection refused".into()));

	let events = h.run(|o| o.fetch_account(source_key())).await;
	assert_eq!(errors(&events), vec!["Network Error"]);
}

#[tokio::test]
async fn build_always_refetches_account() {
	let h = harness();

	let sequences = {
		let mut out = Vec::new();
		for seq in [10, 20] {
			h.chain.sequence.store(seq, Ordering::SeqCst);
			let events = h.run(|o| o.build_unsigned_transaction(source_key(), form())).await;
			out.extend(events.into_iter().filter_map(|e| match e {
				Event::UnsignedTransaction(tx) => Some(tx.sequence),
				_ => None,
			}));
		}
		out
	};

	assert_eq!(sequences, vec![11, 21]);
	let fetches = h
		.calls()
		.iter()
		.filter(|c| c.starts_with("get_account"))
		.count();
	assert_eq!(fetches, 2);
}

#[tokio::test]
async fn missing_destination_is_reported() {
	let h = harness();
	h.chain.known.lock().unwrap().remove(&destination_key());

	let events = h.run(|o| o.build_unsigned_transaction(source_key(), form())).await;
	assert_eq!(errors(&events), vec!["Error: Request failed with status code 404"]);
	let Some(Event::Errors(reports)) = events.iter().find(|e| matches!(e, Event::Errors(_))) else {
		panic!("no error published");
	};
	assert_eq!(reports[0].alert().message, "Destination account does not exist.");
}

#[tokio::test]
async fn device_signs_once_then_submits() {
	let h = harness();
	let tx = unsigned(11);

	let events = h
		.run(|o| {
			o.sign_with_device(DeviceSigningRequest {
				derivation_path: format!(" {PATH} "),
				source: DeviceSource::Unsigned(tx),
			})
		})
		.await;

	assert_eq!(h.calls(), vec![format!("sign {PATH} 11"), "submit 11".to_owned()]);
	let order: Vec<&str> = events
		.iter()
		.filter_map(|e| match e {
			Event::TransactionSigned(_) => Some("signed"),
			Event::TransactionSubmitted(_) => Some("submitted"),
			_ => None,
		})
		.collect();
	assert_eq!(order, vec!["signed", "submitted"]);
	// The device path leaves loading raised.
	assert_eq!(last_loading(&events), Some(true));
}

#[tokio::test]
async fn device_replay_rebuilds_against_fresh_account() {
	let h = harness();
	let stale = unsigned(2);
	let previous = SignedTransaction {
		transaction: stale,
		signatures: vec![DecoratedSignature::new(&[1u8; 32], vec![0u8; 64])],
	};
	h.chain.sequence.store(50, Ordering::SeqCst);

	let events = h
		.run(|o| {
			o.sign_with_device(DeviceSigningRequest {
				derivation_path: PATH.into(),
				source: DeviceSource::Replay {
					previous,
					context: ReplayContext {
						public_key: source_key(),
						form: form(),
					},
				},
			})
		})
		.await;

	assert_eq!(
		h.calls(),
		vec![
			format!("get_account {}", source_key()),
			"build".to_owned(),
			format!("sign {PATH} 51"),
			"submit 51".to_owned(),
		]
	);
	assert!(errors(&events).is_empty());
}

#[tokio::test]
async fn device_failure_stops_before_submission() {
	let h = harness();
	h.device.fail.store(true, Ordering::SeqCst);

	let events = h
		.run(|o| {
			o.sign_with_device(DeviceSigningRequest {
				derivation_path: PATH.into(),
				source: DeviceSource::Unsigned(unsigned(11)),
			})
		})
		.await;

	assert!(!h.calls().iter().any(|c| c.starts_with("submit")));
	assert!(!events.iter().any(|e| matches!(e, Event::TransactionSigned(_))));
	assert_eq!(
		errors(&events),
		vec!["Failed to sign with Ledger device: U2F TIMEOUT"]
	);
	assert_eq!(last_loading(&events), Some(true));
}

#[tokio::test]
async fn key_pair_signs_unsigned_input() {
	let h = harness();

	let events = h
		.run(|o| {
			o.sign_with_key_pair(KeyPairSigningRequest {
				secret: Secret::new(seed()),
				source: KeyPairSource::Unsigned(unsigned(11)),
			})
		})
		.await;

	let signed = events.iter().any(|e| matches!(e, Event::TransactionSigned(_)));
	let key_pair_signed = events
		.iter()
		.any(|e| matches!(e, Event::KeyPairTransactionSigned(_)));
	assert!(signed && key_pair_signed);
	assert_eq!(h.calls(), vec!["submit 11".to_owned()]);
	assert_eq!(last_loading(&events), Some(false));
}

#[tokio::test]
async fn key_pair_signing_uses_secret_verbatim() {
	let h = harness();

	let events = h
		.run(|o| {
			o.sign_with_key_pair(KeyPairSigningRequest {
				secret: Secret::new(format!("{}  ", seed())),
				source: KeyPairSource::Unsigned(unsigned(11)),
			})
		})
		.await;

	assert!(h.calls().is_empty());
	assert_eq!(errors(&events), vec!["Error: invalid encoded string"]);
}

#[tokio::test]
async fn key_pair_submits_signed_input_as_given() {
	let h = harness();
	let given = LocalKeySigner::new()
		.sign_transaction(&Secret::new(seed()), &unsigned(30))
		.unwrap();
	let expected_hash = given.transaction.hash_hex().unwrap();

	let events = h
		.run(|o| {
			o.sign_with_key_pair(KeyPairSigningRequest {
				secret: Secret::new(seed()),
				source: KeyPairSource::Signed(given.clone()),
			})
		})
		.await;

	assert!(!events.iter().any(|e| matches!(e, Event::TransactionSigned(_))));
	let republished = events.iter().find_map(|e| match e {
		Event::KeyPairTransactionSigned(tx) => Some(tx.clone()),
		_ => None,
	});
	assert_eq!(republished, Some(given));
	let confirmation = events.iter().find_map(|e| match e {
		Event::TransactionSubmitted(c) => Some(c.clone()),
		_ => None,
	});
	assert_eq!(confirmation.map(|c| c.hash), Some(expected_hash));
	assert_eq!(h.calls(), vec!["submit 30".to_owned()]);
	assert_eq!(last_loading(&events), Some(false));
}

#[tokio::test]
async fn key_pair_failure_clears_loading() {
	let h = harness();

	let events = h
		.run(|o| {
			o.sign_with_key_pair(KeyPairSigningRequest {
				secret: Secret::new(strkey::encode_account_id(&[3u8; 32])),
				source: KeyPairSource::Unsigned(unsigned(11)),
			})
		})
		.await;

	assert!(h.calls().is_empty());
	assert_eq!(
		errors(&events),
		vec!["Error: invalid version byte. expected 144, got 48"]
	);
	assert_eq!(last_loading(&events), Some(false));
}
