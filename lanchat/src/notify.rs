//! Notification decisions and the sinks that display them.
//!
//! [`NotificationTracker`] decides whether an inbound message deserves a
//! notification, based on which surfaces are attached and visible right
//! now. It keeps no state of its own: the answer is derived from the
//! [`SurfaceRegistry`] and the users' unread flags every time.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::engine::ChatEngine;
use crate::surface::SurfaceRegistry;
use crate::transfer::FileTransferOffer;
use crate::user::{User, UserId};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTarget {
    /// The main chat.
    Main,
    /// A private chat with one user.
    Private(UserId),
    /// An inbound file transfer offer, by offer id.
    FileTransfer(u32),
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Private(id) => write!(f, "private:{id}"),
            Self::FileTransfer(id) => write!(f, "transfer:{id}"),
        }
    }
}

/// Platform notification area.
pub trait NotificationSink: Send + Sync {
    /// Show that a main chat message is unread.
    fn notify_main_message(&self);

    /// Show that a private message from `user` is unread.
    fn notify_private_message(&self, user: &User);

    /// Show that `offer` is waiting for a decision.
    fn notify_file_transfer(&self, offer: &FileTransferOffer);

    /// Withdraw the notification for `offer`.
    fn cancel_file_transfer(&self, offer: &FileTransferOffer);

    /// Clear all message notifications.
    fn reset_all(&self);

    /// Clear the notification for private messages from `user`.
    fn reset_private(&self, user: &User);
}

/// Short-lived feedback shown over whatever is on screen.
pub trait Toaster: Send + Sync {
    /// Show `text` briefly.
    fn toast(&self, text: &str);
}

/// Decides when inbound messages raise notifications.
pub struct NotificationTracker {
    registry: Arc<SurfaceRegistry>,
    notifier: Arc<dyn NotificationSink>,
    engine: Arc<dyn ChatEngine>,
}

impl NotificationTracker {
    /// Create a tracker reading visibility from `registry`.
    #[must_use]
    pub fn new(
        registry: Arc<SurfaceRegistry>,
        notifier: Arc<dyn NotificationSink>,
        engine: Arc<dyn ChatEngine>,
    ) -> Self {
        Self {
            registry,
            notifier,
            engine,
        }
    }

    /// A main chat message arrived. Returns whether a notification was raised.
    pub fn on_main_message_arrived(&self) -> bool {
        if self.registry.is_main_visible() {
            tracing::debug!("main chat visible, no notification");
            return false;
        }
        self.notifier.notify_main_message();
        true
    }

    /// A private message from `user` arrived. Returns whether a
    /// notification was raised.
    ///
    /// Nothing happens while the private chat with `user` is visible.
    /// Otherwise the message is marked unread, and a notification is raised
    /// unless the main chat is visible: the unread marker in the user list
    /// is considered enough there.
    // Suppressing on a visible main chat treats "app in front" as "message
    // seen"; keep it, the private chat flows depend on it.
    pub fn on_private_message_arrived(&self, user: &User) -> bool {
        if self.registry.is_private_visible(user.id()) {
            tracing::debug!(user_id = %user.id(), "private chat visible, no notification");
            return false;
        }

        if !user.set_new_private_message(true) {
            self.engine.change_new_message(user.id(), true);
        }

        if self.registry.is_main_visible() {
            tracing::debug!(user_id = %user.id(), "main chat visible, private notification suppressed");
            return false;
        }
        self.notifier.notify_private_message(user);
        true
    }

    /// Clear every outstanding notification.
    pub fn reset_all(&self) {
        self.notifier.reset_all();
    }

    /// The private chat with `user` was viewed.
    pub fn reset_for_user(&self, user: &User) {
        self.notifier.reset_private(user);
        if user.set_new_private_message(false) {
            self.engine.change_new_message(user.id(), false);
        }
    }
}

/// A call recorded by [`RecordingNotifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedNotification {
    /// A notification was raised.
    Raised(NotificationTarget),
    /// A notification was withdrawn or reset.
    Withdrawn(NotificationTarget),
    /// All message notifications were reset.
    ResetAll,
}

/// Notification sink that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<RecordedNotification>>,
    changed: Condvar,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedNotification> {
        self.events.lock().clone()
    }

    /// Number of raises for `target`.
    #[must_use]
    pub fn raised_count(&self, target: NotificationTarget) -> usize {
        self.count(RecordedNotification::Raised(target))
    }

    /// Number of withdrawals for `target`.
    #[must_use]
    pub fn withdrawn_count(&self, target: NotificationTarget) -> usize {
        self.count(RecordedNotification::Withdrawn(target))
    }

    fn count(&self, wanted: RecordedNotification) -> usize {
        self.events.lock().iter().filter(|e| **e == wanted).count()
    }

    /// Block until at least `count` calls were recorded or `timeout`
    /// elapses. Returns whether the count was reached.
    pub fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while events.len() < count {
            if self.changed.wait_until(&mut events, deadline).timed_out() {
                return events.len() >= count;
            }
        }
        true
    }

    fn record(&self, event: RecordedNotification) {
        self.events.lock().push(event);
        self.changed.notify_all();
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_main_message(&self) {
        self.record(RecordedNotification::Raised(NotificationTarget::Main));
    }

    fn notify_private_message(&self, user: &User) {
        self.record(RecordedNotification::Raised(NotificationTarget::Private(
            user.id(),
        )));
    }

    fn notify_file_transfer(&self, offer: &FileTransferOffer) {
        self.record(RecordedNotification::Raised(
            NotificationTarget::FileTransfer(offer.id()),
        ));
    }

    fn cancel_file_transfer(&self, offer: &FileTransferOffer) {
        self.record(RecordedNotification::Withdrawn(
            NotificationTarget::FileTransfer(offer.id()),
        ));
    }

    fn reset_all(&self) {
        self.record(RecordedNotification::ResetAll);
    }

    fn reset_private(&self, user: &User) {
        self.record(RecordedNotification::Withdrawn(NotificationTarget::Private(
            user.id(),
        )));
    }
}

/// Notification sink that only logs, for the headless binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify_main_message(&self) {
        tracing::info!(notification = %NotificationTarget::Main, "new message");
    }

    fn notify_private_message(&self, user: &User) {
        tracing::info!(
            notification = %NotificationTarget::Private(user.id()),
            nick = %user.nick(),
            "new private message"
        );
    }

    fn notify_file_transfer(&self, offer: &FileTransferOffer) {
        tracing::info!(
            notification = %NotificationTarget::FileTransfer(offer.id()),
            nick = %offer.sender().nick(),
            file = offer.file_name(),
            "file transfer request"
        );
    }

    fn cancel_file_transfer(&self, offer: &FileTransferOffer) {
        tracing::info!(
            notification = %NotificationTarget::FileTransfer(offer.id()),
            "file transfer notification withdrawn"
        );
    }

    fn reset_all(&self) {
        tracing::info!("all notifications reset");
    }

    fn reset_private(&self, user: &User) {
        tracing::info!(notification = %NotificationTarget::Private(user.id()), "notification reset");
    }
}

/// Toaster that records every toast, for tests.
#[derive(Debug, Default)]
pub struct RecordingToaster {
    toasts: Mutex<Vec<String>>,
}

impl RecordingToaster {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All toasts shown, in order.
    #[must_use]
    pub fn toasts(&self) -> Vec<String> {
        self.toasts.lock().clone()
    }

    /// The most recent toast.
    #[must_use]
    pub fn latest(&self) -> Option<String> {
        self.toasts.lock().last().cloned()
    }
}

impl Toaster for RecordingToaster {
    fn toast(&self, text: &str) {
        self.toasts.lock().push(text.to_string());
    }
}
