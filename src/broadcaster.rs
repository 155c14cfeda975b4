//! Broadcaster module - Connection-driven calibration delivery
//!
//! Subscribes to connection-established notifications and, for each one,
//! spawns an independent send attempt: read the artifact, frame it, hand it
//! to the notifier. Attempts may overlap and are never coalesced. There is no
//! "already sent" flag; every connection gets the artifact as it is now.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, error, info, trace, warn};

use crate::contracts::{ConnectionEvent, SendOutcome, SubscriptionId};
use crate::errors::{CalibrationError, MissingDependency, Result};
use crate::notifier::{ConnectedHandler, ConnectionNotifier};
use crate::store::ArtifactStore;
use crate::transmitter::Transmitter;

/// How send attempts are carried out, chosen once at construction
///
/// Hosts without an artifact store get `Disabled`: connection events are
/// still observed but every attempt is a no-op.
#[derive(Clone)]
pub enum SendStrategy {
    Active {
        store: Arc<dyn ArtifactStore>,
        notifier: Arc<dyn ConnectionNotifier>,
    },
    Disabled,
}

impl SendStrategy {
    /// Select the strategy from the capabilities the host offers
    pub fn select(
        store: Option<Arc<dyn ArtifactStore>>,
        notifier: Arc<dyn ConnectionNotifier>,
    ) -> Self {
        match store {
            Some(store) => Self::Active { store, notifier },
            None => Self::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Perform one send attempt
    ///
    /// Never fails: absence and read faults end the attempt quietly,
    /// oversized artifacts are logged and dropped.
    pub async fn attempt(&self) -> SendOutcome {
        let (store, notifier) = match self {
            Self::Active { store, notifier } => (store, notifier),
            Self::Disabled => return SendOutcome::Disabled,
        };

        let artifact = match store.try_read(crate::CALIBRATION_DATA_NAME).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                debug!(name = crate::CALIBRATION_DATA_NAME, "no calibration data available");
                return SendOutcome::NoArtifact;
            }
            Err(e) => {
                warn!(name = crate::CALIBRATION_DATA_NAME, error = %e, "failed to read calibration data");
                return SendOutcome::ReadFailed;
            }
        };

        let frame = match Transmitter::frame_calibration(&artifact) {
            Ok(frame) => frame,
            Err(e) => {
                error!(bytes = artifact.len(), error = %e, "calibration data cannot be framed");
                return SendOutcome::Rejected;
            }
        };

        let frame_len = Transmitter::submit(notifier.as_ref(), &frame);
        debug!(payload_len = artifact.len(), frame_len, "calibration data broadcast");
        SendOutcome::Sent { frame_len }
    }
}

/// Diagnostic counters for send attempts
///
/// Written by completed attempts, never read by the send path.
#[derive(Debug, Default)]
pub struct SendStats {
    scheduled: AtomicU64,
    sent: AtomicU64,
    no_artifact: AtomicU64,
    read_failed: AtomicU64,
    rejected: AtomicU64,
    disabled: AtomicU64,
    dropped_after_shutdown: AtomicU64,
}

impl SendStats {
    fn record(&self, outcome: SendOutcome) {
        let counter = match outcome {
            SendOutcome::Sent { .. } => &self.sent,
            SendOutcome::NoArtifact => &self.no_artifact,
            SendOutcome::ReadFailed => &self.read_failed,
            SendOutcome::Rejected => &self.rejected,
            SendOutcome::Disabled => &self.disabled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts spawned so far
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Attempts that have finished, whatever the outcome
    pub fn completed(&self) -> u64 {
        self.sent() + self.no_artifact() + self.read_failed() + self.rejected() + self.disabled()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn no_artifact(&self) -> u64 {
        self.no_artifact.load(Ordering::Relaxed)
    }

    pub fn read_failed(&self) -> u64 {
        self.read_failed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn disabled(&self) -> u64 {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Events delivered after shutdown and ignored
    pub fn dropped_after_shutdown(&self) -> u64 {
        self.dropped_after_shutdown.load(Ordering::Relaxed)
    }
}

/// Spawns send attempts; shared between the broadcaster and its handler
struct Dispatcher {
    strategy: SendStrategy,
    runtime: Handle,
    active: AtomicBool,
    stats: Arc<SendStats>,
}

impl Dispatcher {
    fn dispatch(self: &Arc<Self>, connection_id: Option<u64>) {
        if !self.active.load(Ordering::Acquire) {
            self.stats.dropped_after_shutdown.fetch_add(1, Ordering::Relaxed);
            trace!(?connection_id, "connection event after shutdown ignored");
            return;
        }

        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
        trace!(?connection_id, "scheduling calibration send");

        let this = Arc::clone(self);
        drop(self.runtime.spawn(async move {
            let outcome = this.strategy.attempt().await;
            this.stats.record(outcome);
        }));
    }
}

/// CalibrationBroadcaster - Sends calibration data on every connection
///
/// Owns exactly one resource: its subscription on the notifier. The
/// subscription is released by `shutdown` or on drop; after that no new
/// attempts are scheduled, while attempts already running finish normally.
pub struct CalibrationBroadcaster {
    notifier: Arc<dyn ConnectionNotifier>,
    subscription: Option<SubscriptionId>,
    dispatcher: Arc<Dispatcher>,
}

impl CalibrationBroadcaster {
    /// Start configuring a broadcaster
    pub fn builder() -> CalibrationBroadcasterBuilder {
        CalibrationBroadcasterBuilder::new()
    }

    /// True until `shutdown` runs
    pub fn is_active(&self) -> bool {
        self.dispatcher.active.load(Ordering::Acquire)
    }

    /// Whether attempts do real work or are no-ops
    pub fn is_enabled(&self) -> bool {
        self.dispatcher.strategy.is_enabled()
    }

    /// Subscription held on the notifier, if still registered
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Shared handle to the send counters
    pub fn stats(&self) -> Arc<SendStats> {
        Arc::clone(&self.dispatcher.stats)
    }

    /// Unregister from the notifier. Idempotent.
    pub fn shutdown(&mut self) {
        self.dispatcher.active.store(false, Ordering::Release);
        if let Some(id) = self.subscription.take() {
            if !self.notifier.unsubscribe(id) {
                debug!(subscription = id.0, "subscription already removed");
            }
            info!(subscription = id.0, "calibration broadcaster stopped");
        }
    }
}

impl Drop for CalibrationBroadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// CalibrationBroadcasterBuilder - Wires collaborators and starts the broadcaster
pub struct CalibrationBroadcasterBuilder {
    notifier: Option<Arc<dyn ConnectionNotifier>>,
    store: Option<Arc<dyn ArtifactStore>>,
    runtime: Option<Handle>,
}

impl CalibrationBroadcasterBuilder {
    pub fn new() -> Self {
        Self {
            notifier: None,
            store: None,
            runtime: None,
        }
    }

    /// Required: source of connection events and the broadcast channel
    pub fn with_notifier(mut self, notifier: Arc<dyn ConnectionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Optional: without a store every attempt is a no-op
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Runtime that send attempts are spawned on
    ///
    /// Defaults to the runtime current at `start`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Subscribe to the notifier and send immediately if already connected
    ///
    /// # Errors
    /// `Configuration` if the notifier or a runtime is missing. Nothing is
    /// subscribed in that case.
    pub fn start(self) -> Result<CalibrationBroadcaster> {
        let notifier = self
            .notifier
            .ok_or(CalibrationError::Configuration(MissingDependency::ConnectionNotifier))?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|_| CalibrationError::Configuration(MissingDependency::Runtime))?,
        };

        let strategy = SendStrategy::select(self.store, Arc::clone(&notifier));
        let enabled = strategy.is_enabled();
        let dispatcher = Arc::new(Dispatcher {
            strategy,
            runtime,
            active: AtomicBool::new(true),
            stats: Arc::new(SendStats::default()),
        });

        let weak: Weak<Dispatcher> = Arc::downgrade(&dispatcher);
        let handler: ConnectedHandler = Arc::new(move |event: ConnectionEvent| {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.dispatch(Some(event.connection_id));
            }
        });
        let subscription = notifier.subscribe(handler);
        info!(subscription = subscription.0, enabled, "calibration broadcaster started");

        if notifier.is_connected() {
            dispatcher.dispatch(None);
        }

        Ok(CalibrationBroadcaster {
            notifier,
            subscription: Some(subscription),
            dispatcher,
        })
    }
}

impl Default for CalibrationBroadcasterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
