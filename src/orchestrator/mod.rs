//! Runs the signing workflows, one tokio task per invocation.
//!
//! Each user intent has its own slot.  Starting an intent bumps the slot's
//! generation and aborts whatever task held it; every publish is checked
//! against the current generation under the slot lock, so a superseded
//! invocation can never emit an event, even one already past its last
//! suspension point.  Different intents do not affect each other.

mod workflows;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, info_span, Instrument};

use crate::error::{BackendError, Extraction};
use crate::events::{ErrorReport, Event, SessionState};
use crate::model::{DeviceSigningRequest, KeyPairSigningRequest, PaymentForm, Secret};
use crate::rpc::BlockchainClient;
use crate::signer::{HardwareSigner, KeyPairSigner};

const EVENT_CAPACITY: usize = 64;

/// A user-triggered operation class.  Only the latest invocation of each
/// class may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
	ConnectDevice,
	ValidateKeyPair,
	ResolvePublicKey,
	FetchAccount,
	BuildUnsignedTransaction,
	SignWithDevice,
	SignWithKeyPair,
}

#[derive(Default)]
struct Slot {
	generation: u64,
	task: Option<AbortHandle>,
}

struct Shared {
	chain: Arc<dyn BlockchainClient>,
	device: Arc<dyn HardwareSigner>,
	keys: Arc<dyn KeyPairSigner>,
	probe_path: String,
	events: broadcast::Sender<Event>,
	session: watch::Sender<SessionState>,
	loading: watch::Sender<bool>,
	slots: Mutex<HashMap<Intent, Slot>>,
}

impl Shared {
	fn slots(&self) -> MutexGuard<'_, HashMap<Intent, Slot>> {
		self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

/// Entry point for presentation code.  Cheap to clone; all clones share
/// the same slots, event stream and session.
///
/// Every workflow method spawns onto the current tokio runtime and
/// returns the task handle.  Awaiting the handle of a superseded
/// invocation yields a cancellation error.
#[derive(Clone)]
pub struct Orchestrator {
	shared: Arc<Shared>,
}

impl Orchestrator {
	/// `probe_path` is the derivation path used to check that a device is
	/// connected and unlocked.
	pub fn new(
		chain: Arc<dyn BlockchainClient>,
		device: Arc<dyn HardwareSigner>,
		keys: Arc<dyn KeyPairSigner>,
		probe_path: impl Into<String>,
	) -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		let (session, _) = watch::channel(SessionState::default());
		let (loading, _) = watch::channel(false);
		Self {
			shared: Arc::new(Shared {
				chain,
				device,
				keys,
				probe_path: probe_path.into(),
				events,
				session,
				loading,
				slots: Mutex::new(HashMap::new()),
			}),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.shared.events.subscribe()
	}

	pub fn session(&self) -> watch::Receiver<SessionState> {
		self.shared.session.subscribe()
	}

	pub fn loading(&self) -> watch::Receiver<bool> {
		self.shared.loading.subscribe()
	}

	pub fn connect_hardware_device(&self) -> JoinHandle<()> {
		let probe_path = self.shared.probe_path.clone();
		self.launch(Intent::ConnectDevice, move |ctx| async move {
			let session = ctx.session();
			let session = workflows::connect_hardware_device(&ctx, session, &probe_path).await;
			ctx.commit(session);
		})
	}

	pub fn validate_key_pair(&self, secret: Secret) -> JoinHandle<()> {
		self.launch(Intent::ValidateKeyPair, move |ctx| async move {
			let session = ctx.session();
			let session = workflows::validate_key_pair(&ctx, session, &secret).await;
			ctx.commit(session);
		})
	}

	pub fn resolve_public_key(&self, derivation_path: impl Into<String>) -> JoinHandle<()> {
		let path = derivation_path.into();
		self.launch(Intent::ResolvePublicKey, move |ctx| async move {
			workflows::resolve_public_key(&ctx, &path).await
		})
	}

	pub fn fetch_account(&self, public_key: impl Into<String>) -> JoinHandle<()> {
		let public_key = public_key.into();
		self.launch(Intent::FetchAccount, move |ctx| async move {
			workflows::fetch_account(&ctx, &public_key).await
		})
	}

	pub fn build_unsigned_transaction(
		&self,
		public_key: impl Into<String>,
		form: PaymentForm,
	) -> JoinHandle<()> {
		let public_key = public_key.into();
		self.launch(Intent::BuildUnsignedTransaction, move |ctx| async move {
			workflows::build_unsigned_transaction(&ctx, &public_key, &form).await
		})
	}

	pub fn sign_with_device(&self, request: DeviceSigningRequest) -> JoinHandle<()> {
		self.launch(Intent::SignWithDevice, move |ctx| async move {
			workflows::sign_with_device(&ctx, request).await
		})
	}

	pub fn sign_with_key_pair(&self, request: KeyPairSigningRequest) -> JoinHandle<()> {
		self.launch(Intent::SignWithKeyPair, move |ctx| async move {
			workflows::sign_with_key_pair(&ctx, request).await
		})
	}

	fn launch<F, Fut>(&self, intent: Intent, workflow: F) -> JoinHandle<()>
	where
		F: FnOnce(Context) -> Fut,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let mut slots = self.shared.slots();
		let slot = slots.entry(intent).or_default();
		slot.generation += 1;
		if let Some(previous) = slot.task.take() {
			if !previous.is_finished() {
				debug!(?intent, "superseding in-flight invocation");
			}
			previous.abort();
		}

		let ctx = Context {
			intent,
			generation: slot.generation,
			shared: Arc::clone(&self.shared),
		};
		let span = info_span!("workflow", ?intent, generation = slot.generation);
		let handle = tokio::spawn(workflow(ctx).instrument(span));
		slot.task = Some(handle.abort_handle());
		handle
	}
}

/// What a running workflow sees: its collaborators plus publish calls that
/// turn into no-ops once the invocation has been superseded.
pub(crate) struct Context {
	intent: Intent,
	generation: u64,
	shared: Arc<Shared>,
}

impl Context {
	pub(crate) fn chain(&self) -> &dyn BlockchainClient {
		self.shared.chain.as_ref()
	}

	pub(crate) fn device(&self) -> &dyn HardwareSigner {
		self.shared.device.as_ref()
	}

	pub(crate) fn keys(&self) -> &dyn KeyPairSigner {
		self.shared.keys.as_ref()
	}

	pub(crate) fn session(&self) -> SessionState {
		*self.shared.session.borrow()
	}

	/// Run `f` only while this invocation is still the latest of its intent.
	fn if_current(&self, f: impl FnOnce(&Shared)) {
		let slots = self.shared.slots();
		if slots.get(&self.intent).map(|s| s.generation) == Some(self.generation) {
			f(&self.shared);
		} else {
			debug!(intent = ?self.intent, generation = self.generation, "dropping output of superseded invocation");
		}
	}

	pub(crate) fn publish(&self, event: Event) {
		self.if_current(|shared| {
			// No subscribers is not an error.
			let _ = shared.events.send(event);
		});
	}

	pub(crate) fn set_loading(&self, on: bool) {
		self.if_current(|shared| {
			shared.loading.send_replace(on);
			let _ = shared.events.send(Event::Loading(on));
		});
	}

	/// Store the flag this intent owns from `session`; the other flag may
	/// have been changed by a concurrent workflow since `session` was read
	/// and is left as it is.
	pub(crate) fn commit(&self, session: SessionState) {
		let intent = self.intent;
		self.if_current(|shared| {
			shared.session.send_modify(|current| match intent {
				Intent::ConnectDevice => current.ledger_connected = session.ledger_connected,
				Intent::ValidateKeyPair => current.key_pair_valid = session.key_pair_valid,
				_ => {}
			});
		});
	}

	pub(crate) fn fail(&self, err: &BackendError, rule: Extraction) {
		let raw = rule.extract(err);
		info!(intent = ?self.intent, %raw, detail = err.detail(), "workflow failed");
		self.publish(Event::Errors(vec![ErrorReport::new(raw)]));
	}
}
