//! The mediator between the chat engine and the front-end.
//!
//! [`ChatFacade`] is the only type the front-end talks to. It routes user
//! actions to the engine, turns engine failures into system messages or
//! toasts, and receives inbound engine events through [`EngineListener`],
//! deciding per event whether a notification is needed.
//!
//! Argument errors ([`MediatorError`]) are returned before anything else
//! happens. Engine failures never escape: they are logged and shown to the
//! user, and the operation itself completes normally.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::engine::{ChatEngine, ConnectionListener, EngineError, EngineListener};
use crate::history::{
    ChatHistory, Color, MessageFormatter, OWN_COLOR, SYSTEM_COLOR, TimestampFormatter,
};
use crate::notify::{NotificationSink, NotificationTracker, Toaster};
use crate::surface::{ConversationSurface, SurfaceRegistry};
use crate::transfer::placement::DownloadPlacement;
use crate::transfer::{ConfirmationCoordinator, FileTransferOffer, TransferDecision};
use crate::user::{User, UserId, UserList};

/// Longest nick name allowed, in characters.
pub const MAX_NICK_LENGTH: usize = 10;

/// Toast shown when a nick name does not pass [`is_valid_nick`].
pub const INVALID_NICK_TEXT: &str = "Invalid nick name";

/// Argument errors, returned before any engine call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediatorError {
    /// A main chat message was empty or blank.
    #[error("Message can not be empty")]
    EmptyMessage,

    /// A private message was empty or blank.
    #[error("Private message can not be empty")]
    EmptyPrivateMessage,

    /// The engine does not know the user.
    #[error("unknown user {0}")]
    UnknownUser(UserId),
}

/// Whether `nick` is 1 to [`MAX_NICK_LENGTH`] letters, digits, `-`, `_` or `.`.
#[must_use]
pub fn is_valid_nick(nick: &str) -> bool {
    let count = nick.chars().count();
    (1..=MAX_NICK_LENGTH).contains(&count)
        && nick
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Mediator between the chat engine and the front-end.
pub struct ChatFacade {
    settings: Settings,
    engine: Arc<dyn ChatEngine>,
    registry: Arc<SurfaceRegistry>,
    tracker: NotificationTracker,
    coordinator: Arc<ConfirmationCoordinator>,
    toaster: Arc<dyn Toaster>,
    formatter: Arc<dyn MessageFormatter>,
    placement: DownloadPlacement,
    main_history: ChatHistory,
    private_histories: Mutex<HashMap<UserId, Arc<ChatHistory>>>,
}

impl ChatFacade {
    /// Create a facade for the local user in `settings`.
    ///
    /// Lines are styled with a [`TimestampFormatter`] using the configured
    /// format; use [`with_formatter`](Self::with_formatter) to replace it.
    #[must_use]
    pub fn new(
        settings: Settings,
        engine: Arc<dyn ChatEngine>,
        notifier: Arc<dyn NotificationSink>,
        toaster: Arc<dyn Toaster>,
    ) -> Self {
        let config = settings.config();
        let registry = Arc::new(SurfaceRegistry::new());
        let tracker = NotificationTracker::new(
            Arc::clone(&registry),
            Arc::clone(&notifier),
            Arc::clone(&engine),
        );
        let coordinator = Arc::new(ConfirmationCoordinator::new(
            notifier,
            config.confirm_poll_interval,
        ));

        let formatter: Arc<dyn MessageFormatter> =
            Arc::new(TimestampFormatter::new(config.timestamp_format.clone()));
        let placement = DownloadPlacement::new(config.download_dir.clone());
        let main_history = ChatHistory::new(config.max_history_lines);

        Self {
            settings,
            engine,
            registry,
            tracker,
            coordinator,
            toaster,
            formatter,
            placement,
            main_history,
            private_histories: Mutex::new(HashMap::new()),
        }
    }

    /// Use `formatter` for every line shown from now on.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn MessageFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The settings handle.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The local user.
    #[must_use]
    pub const fn me(&self) -> &Arc<User> {
        self.settings.me()
    }

    /// Look up a user through the engine.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<Arc<User>> {
        self.engine.user(id)
    }

    /// Snapshot of everyone online, the local user first.
    #[must_use]
    pub fn user_list(&self) -> UserList {
        UserList::sorted(self.engine.users(), self.me().id())
    }

    /// Surfaces currently attached.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SurfaceRegistry> {
        &self.registry
    }

    /// Whether the main chat is attached and visible.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.registry.is_main_visible()
    }

    /// Whether the main chat is attached and focused.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.registry.is_main_focused()
    }

    /// Find an inbound offer by sender id and offer id.
    #[must_use]
    pub fn file_offer(&self, user_id: UserId, offer_id: u32) -> Option<Arc<FileTransferOffer>> {
        let user = self.engine.user(user_id)?;
        self.engine.file_offer(&user, offer_id)
    }

    // -----------------------------------------------------------------------
    // Surfaces
    // -----------------------------------------------------------------------

    /// Attach the main chat and fill it with the history so far.
    pub fn register_main_surface(&self, surface: Arc<dyn ConversationSurface>) {
        self.registry.attach_main(surface, &self.main_history);
    }

    /// Detach the main chat. Does nothing if none is attached.
    pub fn unregister_main_surface(&self) {
        self.registry.detach_main();
    }

    /// Attach a private chat with `user`, or return the one already open.
    ///
    /// A newly attached surface is filled with the conversation so far and
    /// given its title.
    pub fn create_private_chat(
        &self,
        user: &User,
        surface: Arc<dyn ConversationSurface>,
    ) -> Arc<dyn ConversationSurface> {
        let (attached, inserted) = self.registry.attach_private(user, surface);
        if inserted {
            attached.replace_content(&self.private_history(user.id()).contents());
            attached.update_title(&self.private_title(user));
        }
        attached
    }

    /// Detach the private chat with `user`. Does nothing if none is open.
    pub fn close_private_chat(&self, user: &User) {
        self.registry.detach_private(user);
    }

    /// Set the main chat title from the local nick and the topic.
    pub fn show_topic(&self) {
        let Some(main) = self.registry.main() else {
            return;
        };
        main.update_title(&self.main_title());
    }

    /// Refresh the title of the private chat with `user`, if open.
    pub fn show_private_title(&self, user: &User) {
        if let Some(surface) = self.registry.private(user.id()) {
            surface.update_title(&self.private_title(user));
        }
    }

    /// `"<nick> - <app>"`, or `"<nick> - Topic: <topic> (<setter>) - <app>"`.
    #[must_use]
    pub fn main_title(&self) -> String {
        let topic = self.engine.topic();
        let nick = self.me().nick();
        let app = &self.settings.config().app_name;
        if topic.is_set() {
            format!("{nick} - Topic: {} ({}) - {app}", topic.text, topic.nick)
        } else {
            format!("{nick} - {app}")
        }
    }

    /// `"<nick> - <app>"`, or `"<nick> (away: <message>) - <app>"`.
    #[must_use]
    pub fn private_title(&self, user: &User) -> String {
        let app = &self.settings.config().app_name;
        match user.away_message() {
            Some(away) => format!("{} (away: {away}) - {app}", user.nick()),
            None => format!("{} - {app}", user.nick()),
        }
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    /// Notification decision for a main chat message.
    pub fn notify_message_arrived(&self) -> bool {
        self.tracker.on_main_message_arrived()
    }

    /// Notification decision for a private message from `user`.
    pub fn notify_private_message_arrived(&self, user: &User) -> bool {
        self.tracker.on_private_message_arrived(user)
    }

    /// The user marked everything as read.
    pub fn reset_all_notifications(&self) {
        self.tracker.reset_all();
    }

    /// The private chat with `user` was shown.
    pub fn activated_private_chat(&self, user: &User) {
        self.tracker.reset_for_user(user);
    }

    // -----------------------------------------------------------------------
    // Conversation content
    // -----------------------------------------------------------------------

    /// Add a line to the main chat.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EmptyMessage`] if `text` is blank.
    pub fn append_to_chat(&self, text: &str, color: Color) -> Result<(), MediatorError> {
        if text.trim().is_empty() {
            return Err(MediatorError::EmptyMessage);
        }
        self.append_main(text, color);
        Ok(())
    }

    /// Add a line to the private chat with `user`.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EmptyPrivateMessage`] if `text` is blank.
    pub fn append_to_private_chat(
        &self,
        user: &User,
        text: &str,
        color: Color,
    ) -> Result<(), MediatorError> {
        if text.trim().is_empty() {
            return Err(MediatorError::EmptyPrivateMessage);
        }
        self.append_private(user, text, color);
        Ok(())
    }

    fn append_main(&self, text: &str, color: Color) {
        let styled = self
            .main_history
            .style_and_append(self.formatter.as_ref(), text, color);
        if let Some(main) = self.registry.main() {
            main.append_message(&styled);
        }
    }

    fn append_private(&self, user: &User, text: &str, color: Color) {
        let styled = self.private_history(user.id()).style_and_append(
            self.formatter.as_ref(),
            text,
            color,
        );
        if let Some(surface) = self.registry.private(user.id()) {
            surface.append_message(&styled);
        }
    }

    fn private_history(&self, user_id: UserId) -> Arc<ChatHistory> {
        let max_lines = self.settings.config().max_history_lines;
        Arc::clone(
            self.private_histories
                .lock()
                .entry(user_id)
                .or_insert_with(|| Arc::new(ChatHistory::new(max_lines))),
        )
    }

    /// Show a message written by the local user in the main chat.
    pub fn show_own_message(&self, text: &str) {
        self.append_main(&format!("<{}>: {text}", self.me().nick()), OWN_COLOR);
    }

    /// Show a system message in the main chat.
    pub fn show_system_message(&self, text: &str) {
        self.append_main(&format!("*** {text}"), SYSTEM_COLOR);
    }

    /// Show a message written by the local user in the chat with `user`.
    pub fn show_private_own_message(&self, user: &User, text: &str) {
        self.append_private(user, &format!("<{}>: {text}", self.me().nick()), OWN_COLOR);
    }

    /// Show a system message in the private chat with `user`.
    pub fn show_private_system_message(&self, user: &User, text: &str) {
        self.append_private(user, &format!("*** {text}"), SYSTEM_COLOR);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Send a message to the main chat.
    ///
    /// Engine failures are shown as a system message and not returned.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EmptyMessage`] if `text` is blank.
    pub fn send_message(&self, text: &str) -> Result<(), MediatorError> {
        if text.trim().is_empty() {
            return Err(MediatorError::EmptyMessage);
        }

        match self.engine.send_chat_message(text) {
            Ok(()) => self.show_own_message(text),
            Err(e) => {
                tracing::warn!(error = %e, "chat message not sent");
                self.show_system_message(&e.to_string());
            }
        }
        Ok(())
    }

    /// Send a private message to `user`.
    ///
    /// Engine failures are shown as a system message in the private chat
    /// and not returned.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EmptyPrivateMessage`] if `text` is blank.
    pub fn send_private_message(&self, text: &str, user: &User) -> Result<(), MediatorError> {
        if text.trim().is_empty() {
            return Err(MediatorError::EmptyPrivateMessage);
        }

        match self.engine.send_private_message(text, user) {
            Ok(()) => self.show_private_own_message(user, text),
            Err(e) => {
                tracing::warn!(user_id = %user.id(), error = %e, "private message not sent");
                self.show_private_system_message(user, &e.to_string());
            }
        }
        Ok(())
    }

    /// Change the local nick name. Returns whether it changed.
    ///
    /// Surrounding whitespace is ignored. Invalid, taken, or rejected nick
    /// names are reported with a toast.
    pub fn change_nick_name(&self, nick: &str) -> bool {
        let nick = nick.trim();
        if nick == self.me().nick() {
            return false;
        }

        if !is_valid_nick(nick) {
            self.toaster.toast(INVALID_NICK_TEXT);
            return false;
        }

        if self.engine.is_nick_in_use(nick) {
            self.toaster.toast(&EngineError::NickInUse.to_string());
            return false;
        }

        if let Err(e) = self.engine.change_my_nick(nick) {
            tracing::warn!(nick, error = %e, "nick change rejected");
            self.toaster.toast(&e.to_string());
            return false;
        }

        tracing::info!(nick, "nick name changed");
        self.show_system_message(&format!("You changed nick to {}", self.me().nick()));
        self.show_topic();
        true
    }

    /// Offer `file` to `user`. Failures are shown as a toast.
    pub fn send_file(&self, user: &User, file: &Path) {
        if let Err(e) = self.engine.send_file(user, file) {
            tracing::warn!(user_id = %user.id(), file = %file.display(), error = %e, "file not offered");
            self.toaster.toast(&e.to_string());
        }
    }

    /// Tell peers whether the local user is typing.
    pub fn update_me_writing(&self, writing: bool) {
        self.engine.update_me_writing(writing);
    }

    /// Log on to the network.
    pub fn log_on(&self) {
        self.engine.log_on();
    }

    /// Log off quietly and shut the engine down.
    pub fn log_off(&self) {
        self.engine.log_off(false);
        self.engine.shutdown();
    }

    /// Whether the engine is logged on.
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        self.engine.is_logged_on()
    }

    /// Forward a connection listener to the engine.
    pub fn register_connection_listener(&self, listener: Arc<dyn ConnectionListener>) {
        self.engine.register_connection_listener(listener);
    }

    // -----------------------------------------------------------------------
    // File transfers
    // -----------------------------------------------------------------------

    /// Reserve a download location for `offer` without overwriting.
    ///
    /// On failure the offer keeps no location; the engine decides what to
    /// do with an accepted offer that has nowhere to go.
    pub fn prepare_incoming_transfer(&self, offer: &FileTransferOffer) {
        match self.placement.place(offer.file_name()) {
            Ok(path) => offer.set_file(&path),
            Err(e) => tracing::warn!(offer_id = offer.id(), error = %e, "no download location"),
        }
    }

    /// Free the location reserved for `offer`, if any.
    ///
    /// Used when the offer ends without being accepted, so the empty
    /// placeholder does not stay in the download directory.
    pub fn release_incoming_transfer(&self, offer: &FileTransferOffer) {
        let Some(path) = offer.take_file() else {
            return;
        };
        if let Err(e) = self.placement.release(&path) {
            tracing::warn!(offer_id = offer.id(), error = %e, "download location not released");
        }
    }

    /// Notify about `offer` and block until the user or sender decides.
    pub fn show_file_save(&self, offer: &FileTransferOffer) -> TransferDecision {
        self.coordinator.confirm(offer)
    }

    /// Like [`show_file_save`](Self::show_file_save), on a blocking task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_file_save(&self, offer: Arc<FileTransferOffer>) -> JoinHandle<TransferDecision> {
        self.coordinator.spawn_confirmation(offer)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Show an inbound private message and decide on a notification.
    ///
    /// Returns whether a notification was raised.
    ///
    /// # Errors
    ///
    /// Returns [`MediatorError::EmptyPrivateMessage`] for blank text and
    /// [`MediatorError::UnknownUser`] if the engine does not know `user_id`.
    pub fn receive_private_message(
        &self,
        user_id: UserId,
        text: &str,
        color: Color,
    ) -> Result<bool, MediatorError> {
        if text.trim().is_empty() {
            return Err(MediatorError::EmptyPrivateMessage);
        }
        let user = self
            .engine
            .user(user_id)
            .ok_or(MediatorError::UnknownUser(user_id))?;

        let notified = self.tracker.on_private_message_arrived(&user);
        self.append_private(&user, text, color);
        Ok(notified)
    }
}

impl EngineListener for ChatFacade {
    fn message_arrived(&self, user: &User, text: &str, color: Color) {
        if text.trim().is_empty() {
            tracing::debug!(user_id = %user.id(), "ignoring blank message");
            return;
        }
        self.tracker.on_main_message_arrived();
        self.append_main(text, color);
    }

    fn private_message_arrived(&self, user_id: UserId, text: &str, color: Color) {
        if let Err(e) = self.receive_private_message(user_id, text, color) {
            tracing::warn!(%user_id, error = %e, "private message dropped");
        }
    }

    fn topic_changed(&self) {
        self.show_topic();
    }

    fn file_offer_arrived(&self, offer: &Arc<FileTransferOffer>) -> TransferDecision {
        self.prepare_incoming_transfer(offer);
        let decision = self.show_file_save(offer);
        if decision != TransferDecision::Accepted {
            self.release_incoming_transfer(offer);
        }
        decision
    }
}
