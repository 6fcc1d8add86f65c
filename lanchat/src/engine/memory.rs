//! In-process engine for tests and the headless binary.
//!
//! Keeps the user list, topic, and pending offers in memory and records
//! every command it receives. Failures can be injected per operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use super::{ChatEngine, ConnectionListener, EngineError};
use crate::transfer::FileTransferOffer;
use crate::user::{Topic, User, UserId};

/// A command received by [`InMemoryEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `send_chat_message`.
    SendChatMessage(String),
    /// `send_private_message`.
    SendPrivateMessage {
        /// Target user.
        user: UserId,
        /// Message text.
        text: String,
    },
    /// `change_my_nick`.
    ChangeMyNick(String),
    /// `is_nick_in_use`.
    IsNickInUse(String),
    /// `topic`.
    Topic,
    /// `user`.
    User(UserId),
    /// `log_on`.
    LogOn,
    /// `log_off`.
    LogOff(bool),
    /// `shutdown`.
    Shutdown,
    /// `change_new_message`.
    ChangeNewMessage(UserId, bool),
    /// `update_me_writing`.
    UpdateMeWriting(bool),
    /// `file_offer`.
    FileOffer(UserId, u32),
    /// `send_file`.
    SendFile {
        /// Target user.
        user: UserId,
        /// File offered.
        file: PathBuf,
    },
}

/// Operations that accept injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `send_chat_message`.
    SendChatMessage,
    /// `send_private_message`.
    SendPrivateMessage,
    /// `change_my_nick`.
    ChangeMyNick,
    /// `send_file`.
    SendFile,
}

/// Engine keeping all state in memory.
pub struct InMemoryEngine {
    me: Arc<User>,
    users: RwLock<Vec<Arc<User>>>,
    topic: RwLock<Topic>,
    logged_on: AtomicBool,
    offers: Mutex<HashMap<(UserId, u32), Arc<FileTransferOffer>>>,
    failures: Mutex<HashMap<Operation, EngineError>>,
    listeners: Mutex<Vec<Arc<dyn ConnectionListener>>>,
    calls: Mutex<Vec<EngineCall>>,
}

impl InMemoryEngine {
    /// Create a logged-off engine whose local user is `me`.
    #[must_use]
    pub fn new(me: Arc<User>) -> Self {
        Self {
            users: RwLock::new(vec![Arc::clone(&me)]),
            me,
            topic: RwLock::new(Topic::default()),
            logged_on: AtomicBool::new(false),
            offers: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The local user.
    #[must_use]
    pub const fn me(&self) -> &Arc<User> {
        &self.me
    }

    /// A peer logs on.
    pub fn add_user(&self, user: Arc<User>) {
        self.users.write().push(user);
    }

    /// A peer logs off.
    pub fn remove_user(&self, id: UserId) -> Option<Arc<User>> {
        let mut users = self.users.write();
        let index = users.iter().position(|u| u.id() == id)?;
        Some(users.remove(index))
    }

    /// Replace the topic.
    pub fn set_topic(&self, topic: Topic) {
        *self.topic.write() = topic;
    }

    /// Register an inbound offer so it can be looked up.
    pub fn add_offer(&self, offer: Arc<FileTransferOffer>) {
        self.offers
            .lock()
            .insert((offer.sender().id(), offer.id()), offer);
    }

    /// Forget an offer once its outcome has been handled.
    pub fn remove_offer(&self, user_id: UserId, offer_id: u32) -> Option<Arc<FileTransferOffer>> {
        self.offers.lock().remove(&(user_id, offer_id))
    }

    /// Drop every offer that is no longer pending. Returns how many went.
    pub fn prune_decided_offers(&self) -> usize {
        let mut offers = self.offers.lock();
        let before = offers.len();
        offers.retain(|_, offer| !offer.decision().is_terminal());
        before - offers.len()
    }

    /// Make every later call to `operation` fail with `error`.
    pub fn fail(&self, operation: Operation, error: EngineError) {
        self.failures.lock().insert(operation, error);
    }

    /// Stop injecting failures for `operation`.
    pub fn succeed(&self, operation: Operation) {
        self.failures.lock().remove(&operation);
    }

    /// Every command received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded commands.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Unread-state changes published through `change_new_message`.
    #[must_use]
    pub fn new_message_changes(&self) -> Vec<(UserId, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::ChangeNewMessage(id, unread) => Some((*id, *unread)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    fn injected(&self, operation: Operation) -> Result<(), EngineError> {
        self.failures
            .lock()
            .get(&operation)
            .map_or(Ok(()), |e| Err(e.clone()))
    }

    fn require_logged_on(&self) -> Result<(), EngineError> {
        if self.is_logged_on() {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }

    fn nick_taken(&self, nick: &str) -> bool {
        let me = self.me.id();
        self.users
            .read()
            .iter()
            .any(|u| u.id() != me && u.nick().eq_ignore_ascii_case(nick))
    }

    fn set_connected(&self, connected: bool) {
        let was = self.logged_on.swap(connected, Ordering::AcqRel);
        if was == connected {
            return;
        }
        let listeners: Vec<_> = self.listeners.lock().clone();
        for listener in listeners {
            listener.connection_changed(connected);
        }
    }
}

impl ChatEngine for InMemoryEngine {
    fn send_chat_message(&self, text: &str) -> Result<(), EngineError> {
        self.record(EngineCall::SendChatMessage(text.to_string()));
        self.injected(Operation::SendChatMessage)?;
        self.require_logged_on()
    }

    fn send_private_message(&self, text: &str, user: &User) -> Result<(), EngineError> {
        self.record(EngineCall::SendPrivateMessage {
            user: user.id(),
            text: text.to_string(),
        });
        self.injected(Operation::SendPrivateMessage)?;
        self.require_logged_on()?;
        if user.is_away() {
            return Err(EngineError::UserAway);
        }
        if !self.users.read().iter().any(|u| u.id() == user.id()) {
            return Err(EngineError::UserOffline);
        }
        Ok(())
    }

    fn change_my_nick(&self, nick: &str) -> Result<(), EngineError> {
        self.record(EngineCall::ChangeMyNick(nick.to_string()));
        self.injected(Operation::ChangeMyNick)?;
        if self.nick_taken(nick) {
            return Err(EngineError::NickInUse);
        }
        self.me.set_nick(nick);
        Ok(())
    }

    fn is_nick_in_use(&self, nick: &str) -> bool {
        self.record(EngineCall::IsNickInUse(nick.to_string()));
        self.nick_taken(nick)
    }

    fn topic(&self) -> Topic {
        self.record(EngineCall::Topic);
        self.topic.read().clone()
    }

    fn user(&self, id: UserId) -> Option<Arc<User>> {
        self.record(EngineCall::User(id));
        self.users.read().iter().find(|u| u.id() == id).cloned()
    }

    fn users(&self) -> Vec<Arc<User>> {
        self.users.read().clone()
    }

    fn log_on(&self) {
        self.record(EngineCall::LogOn);
        self.set_connected(true);
    }

    fn log_off(&self, notify_peers: bool) {
        self.record(EngineCall::LogOff(notify_peers));
        self.set_connected(false);
    }

    fn shutdown(&self) {
        self.record(EngineCall::Shutdown);
        self.listeners.lock().clear();
    }

    fn is_logged_on(&self) -> bool {
        self.logged_on.load(Ordering::Acquire)
    }

    fn change_new_message(&self, user_id: UserId, unread: bool) {
        self.record(EngineCall::ChangeNewMessage(user_id, unread));
    }

    fn update_me_writing(&self, writing: bool) {
        self.record(EngineCall::UpdateMeWriting(writing));
    }

    fn file_offer(&self, user: &User, offer_id: u32) -> Option<Arc<FileTransferOffer>> {
        self.record(EngineCall::FileOffer(user.id(), offer_id));
        self.offers.lock().get(&(user.id(), offer_id)).cloned()
    }

    fn send_file(&self, user: &User, file: &Path) -> Result<(), EngineError> {
        self.record(EngineCall::SendFile {
            user: user.id(),
            file: file.to_path_buf(),
        });
        self.injected(Operation::SendFile)?;
        self.require_logged_on()?;
        if !file.is_file() {
            return Err(EngineError::Command(format!(
                "Could not find the file {}",
                file.display()
            )));
        }
        Ok(())
    }

    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners.lock().push(listener);
    }
}
