//! Boundary to the background chat engine.
//!
//! The engine owns the network, the user list, and file transfers. The
//! mediator talks to it through [`ChatEngine`] and receives inbound events
//! through [`EngineListener`]. Every fallible engine call returns an
//! [`EngineError`], which the facade turns into user-visible feedback.

pub mod memory;

use std::path::Path;
use std::sync::Arc;

use crate::history::Color;
use crate::transfer::{FileTransferOffer, TransferDecision};
use crate::user::{Topic, User, UserId};

/// Failures reported by the engine.
///
/// The display text is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The target of a private message is away.
    #[error("You can not send a private chat message to a user that is away")]
    UserAway,

    /// The target user is no longer logged on.
    #[error("You can not send a private chat message to a user that is offline")]
    UserOffline,

    /// The requested nick name is taken.
    #[error("The nick name is in use by someone else.")]
    NickInUse,

    /// The engine is not connected to the network.
    #[error("You can not do that when you are not connected")]
    NotConnected,

    /// Any other command failure, with its message.
    #[error("{0}")]
    Command(String),
}

/// Commands the mediator sends to the engine.
pub trait ChatEngine: Send + Sync {
    /// Broadcast a message to the main chat.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the message could not be sent.
    fn send_chat_message(&self, text: &str) -> Result<(), EngineError>;

    /// Send a private message to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserAway`] or [`EngineError::UserOffline`]
    /// if the user can not receive private messages, or another
    /// [`EngineError`] if sending failed.
    fn send_private_message(&self, text: &str, user: &User) -> Result<(), EngineError>;

    /// Change the local user's nick name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the change was rejected.
    fn change_my_nick(&self, nick: &str) -> Result<(), EngineError>;

    /// Whether another user already uses `nick`.
    fn is_nick_in_use(&self, nick: &str) -> bool;

    /// The current topic.
    fn topic(&self) -> Topic;

    /// Look up a user by id.
    fn user(&self, id: UserId) -> Option<Arc<User>>;

    /// All users currently known, the local user included.
    fn users(&self) -> Vec<Arc<User>>;

    /// Log on to the network.
    fn log_on(&self);

    /// Log off. `notify_peers` is false when shutting down quietly.
    fn log_off(&self, notify_peers: bool);

    /// Release engine resources after logging off.
    fn shutdown(&self);

    /// Whether the engine is logged on.
    fn is_logged_on(&self) -> bool;

    /// Publish the unread-private-message state for `user_id` to peers.
    fn change_new_message(&self, user_id: UserId, unread: bool);

    /// Publish whether the local user is writing.
    fn update_me_writing(&self, writing: bool);

    /// Find an inbound file transfer offer from `user` by offer id.
    fn file_offer(&self, user: &User, offer_id: u32) -> Option<Arc<FileTransferOffer>>;

    /// Offer a file to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the offer could not be sent.
    fn send_file(&self, user: &User, file: &Path) -> Result<(), EngineError>;

    /// Register a listener for connection status changes.
    fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>);
}

/// Inbound events from the engine.
///
/// Called on engine threads, never on the front-end's thread.
pub trait EngineListener: Send + Sync {
    /// A main chat message arrived and was formatted as `text`.
    fn message_arrived(&self, user: &User, text: &str, color: Color);

    /// A private message arrived from `user_id`.
    fn private_message_arrived(&self, user_id: UserId, text: &str, color: Color);

    /// The topic changed.
    fn topic_changed(&self);

    /// A file transfer offer arrived. Blocks until it is decided.
    fn file_offer_arrived(&self, offer: &Arc<FileTransferOffer>) -> TransferDecision;
}

/// Observer of the network connection state.
pub trait ConnectionListener: Send + Sync {
    /// Called when the connection goes up or down.
    fn connection_changed(&self, connected: bool);
}
