//! Inbound file transfer offers and the blocking confirmation protocol.
//!
//! The engine hands each offer to [`ConfirmationCoordinator::confirm`] on
//! its own thread and waits for the answer. The user decides on the
//! front-end's thread via [`FileTransferOffer::accept`] or
//! [`FileTransferOffer::reject`]; the sender may give up at any time, which
//! the network layer reports via [`FileTransferOffer::cancel`]. All three
//! end the wait.
//!
//! Once accepted, the engine reports progress through
//! [`FileTransferOffer::update_progress`], which front-ends follow by
//! registering a [`TransferListener`].

pub mod placement;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::notify::NotificationSink;
use crate::user::User;

/// Decision state of an offer. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDecision {
    /// Waiting for the user.
    Pending,
    /// The user accepted; the engine starts receiving.
    Accepted,
    /// The user declined.
    Rejected,
    /// The sender withdrew the offer.
    Canceled,
}

impl TransferDecision {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransferDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Follows one offer from decision through completion.
///
/// Both methods default to doing nothing.
pub trait TransferListener: Send + Sync {
    /// The offer left `Pending`.
    fn decision_changed(&self, _offer: &FileTransferOffer, _decision: TransferDecision) {}

    /// `transferred` of [`FileTransferOffer::size`] bytes have arrived.
    fn progress_changed(&self, _offer: &FileTransferOffer, _transferred: u64) {}
}

/// An inbound request to receive a file.
pub struct FileTransferOffer {
    id: u32,
    sender: Arc<User>,
    file_name: String,
    size: u64,
    file: RwLock<Option<PathBuf>>,
    decision: Mutex<TransferDecision>,
    decided: Condvar,
    transferred: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn TransferListener>>>,
}

impl FileTransferOffer {
    /// Create a pending offer.
    #[must_use]
    pub fn new(id: u32, sender: Arc<User>, file_name: impl Into<String>, size: u64) -> Self {
        Self {
            id,
            sender,
            file_name: file_name.into(),
            size,
            file: RwLock::new(None),
            decision: Mutex::new(TransferDecision::Pending),
            decided: Condvar::new(),
            transferred: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Offer id, unique per sender.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// The user offering the file.
    #[must_use]
    pub const fn sender(&self) -> &Arc<User> {
        &self.sender
    }

    /// File name as given by the sender.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Where the file will be written, once placed.
    #[must_use]
    pub fn file(&self) -> Option<PathBuf> {
        self.file.read().clone()
    }

    /// Set where the file will be written.
    pub fn set_file(&self, path: &Path) {
        *self.file.write() = Some(path.to_path_buf());
    }

    /// Forget the location, returning it.
    pub fn take_file(&self) -> Option<PathBuf> {
        self.file.write().take()
    }

    /// Follow this offer with `listener`.
    pub fn register_transfer_listener(&self, listener: Arc<dyn TransferListener>) {
        self.listeners.write().push(listener);
    }

    /// Bytes received so far.
    #[must_use]
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Acquire)
    }

    /// Received share of the file, 0 to 100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.size == 0 {
            return 100;
        }
        let transferred = u128::from(self.transferred().min(self.size));
        u8::try_from(transferred * 100 / u128::from(self.size)).unwrap_or(100)
    }

    /// The engine received more of the file. Ignored unless accepted.
    pub fn update_progress(&self, transferred: u64) {
        if self.decision() != TransferDecision::Accepted {
            tracing::debug!(offer_id = self.id, "progress for undecided offer ignored");
            return;
        }
        self.transferred.store(transferred, Ordering::Release);
        for listener in self.listeners() {
            listener.progress_changed(self, transferred);
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn TransferListener>> {
        self.listeners.read().clone()
    }

    /// Current decision state.
    #[must_use]
    pub fn decision(&self) -> TransferDecision {
        *self.decision.lock()
    }

    /// The user accepts. Returns `false` if the offer was already decided.
    pub fn accept(&self) -> bool {
        self.decide(TransferDecision::Accepted)
    }

    /// The user declines. Returns `false` if the offer was already decided.
    pub fn reject(&self) -> bool {
        self.decide(TransferDecision::Rejected)
    }

    /// The sender withdrew. Returns `false` if the offer was already decided.
    pub fn cancel(&self) -> bool {
        self.decide(TransferDecision::Canceled)
    }

    fn decide(&self, outcome: TransferDecision) -> bool {
        {
            let mut decision = self.decision.lock();
            if decision.is_terminal() {
                tracing::debug!(
                    offer_id = self.id,
                    current = %*decision,
                    ignored = %outcome,
                    "offer already decided"
                );
                return false;
            }
            *decision = outcome;
            self.decided.notify_all();
        }
        for listener in self.listeners() {
            listener.decision_changed(self, outcome);
        }
        true
    }

    /// Block until the offer leaves `Pending` and return the outcome.
    ///
    /// The state is re-checked at least every `poll_interval` even if no
    /// wakeup arrives.
    pub fn wait_decided(&self, poll_interval: Duration) -> TransferDecision {
        let mut decision = self.decision.lock();
        while !decision.is_terminal() {
            self.decided.wait_for(&mut decision, poll_interval);
        }
        *decision
    }
}

impl fmt::Debug for FileTransferOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransferOffer")
            .field("id", &self.id)
            .field("sender", &self.sender.id())
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .field("transferred", &self.transferred())
            .field("decision", &self.decision())
            .finish_non_exhaustive()
    }
}

/// Runs the notify, wait, withdraw sequence for inbound offers.
///
/// Each call to [`confirm`](Self::confirm) is independent, so concurrent
/// offers never interfere with each other.
pub struct ConfirmationCoordinator {
    notifier: Arc<dyn NotificationSink>,
    poll_interval: Duration,
}

impl ConfirmationCoordinator {
    /// Create a coordinator raising notifications through `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn NotificationSink>, poll_interval: Duration) -> Self {
        Self {
            notifier,
            poll_interval,
        }
    }

    /// Interval at which a waiting offer is re-checked.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Notify the user about `offer` and block until it is decided.
    ///
    /// The notification is withdrawn exactly once, whatever the outcome.
    pub fn confirm(&self, offer: &FileTransferOffer) -> TransferDecision {
        tracing::info!(
            offer_id = offer.id(),
            user_id = %offer.sender().id(),
            file = offer.file_name(),
            "waiting for file transfer decision"
        );
        self.notifier.notify_file_transfer(offer);

        let decision = offer.wait_decided(self.poll_interval);

        self.notifier.cancel_file_transfer(offer);
        tracing::info!(offer_id = offer.id(), %decision, "file transfer decided");
        decision
    }

    /// Run [`confirm`](Self::confirm) on a dedicated blocking task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_confirmation(
        self: &Arc<Self>,
        offer: Arc<FileTransferOffer>,
    ) -> JoinHandle<TransferDecision> {
        let coordinator = Arc::clone(self);
        tokio::task::spawn_blocking(move || coordinator.confirm(&offer))
    }
}
