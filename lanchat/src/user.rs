//! Users, topics, and the user list snapshot.
//!
//! A [`User`] is created by the engine when a peer is discovered (or at
//! log on, for the local user) and shared as `Arc<User>` between the engine
//! and the mediator. The mediator only touches the unread flag and the
//! private surface back-reference.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::surface::ConversationSurface;

/// Numeric identity of a user on the LAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A chat participant.
pub struct User {
    id: UserId,
    nick: RwLock<String>,
    away_message: RwLock<Option<String>>,
    new_private_message: AtomicBool,
    private_surface: RwLock<Option<Weak<dyn ConversationSurface>>>,
}

impl User {
    /// Create a user with the given nick name and id.
    #[must_use]
    pub fn new(nick: impl Into<String>, id: u32) -> Self {
        Self {
            id: UserId(id),
            nick: RwLock::new(nick.into()),
            away_message: RwLock::new(None),
            new_private_message: AtomicBool::new(false),
            private_surface: RwLock::new(None),
        }
    }

    /// The user's id.
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Current nick name.
    #[must_use]
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    /// Replace the nick name. Only the engine should call this.
    pub fn set_nick(&self, nick: impl Into<String>) {
        *self.nick.write() = nick.into();
    }

    /// Whether the user has marked themselves as away.
    #[must_use]
    pub fn is_away(&self) -> bool {
        self.away_message.read().is_some()
    }

    /// The away message, if the user is away.
    #[must_use]
    pub fn away_message(&self) -> Option<String> {
        self.away_message.read().clone()
    }

    /// Set or clear the away state. `None` means the user is back.
    pub fn set_away(&self, message: Option<String>) {
        *self.away_message.write() = message;
    }

    /// Whether there are unread private messages from this user.
    #[must_use]
    pub fn has_new_private_message(&self) -> bool {
        self.new_private_message.load(Ordering::Acquire)
    }

    /// Set the unread flag, returning the previous value.
    pub fn set_new_private_message(&self, unread: bool) -> bool {
        self.new_private_message.swap(unread, Ordering::AcqRel)
    }

    /// The private conversation surface currently attached for this user.
    ///
    /// The registry owns the surface; this is a non-owning back-reference
    /// and returns `None` once the surface has been detached or dropped.
    #[must_use]
    pub fn private_surface(&self) -> Option<Arc<dyn ConversationSurface>> {
        self.private_surface.read().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_private_surface(&self, surface: Option<&Arc<dyn ConversationSurface>>) {
        *self.private_surface.write() = surface.map(Arc::downgrade);
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("nick", &*self.nick.read())
            .field("away", &self.is_away())
            .field("new_private_message", &self.has_new_private_message())
            .finish_non_exhaustive()
    }
}

/// The chat topic. An empty text means no topic is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topic {
    /// Topic text.
    pub text: String,
    /// Nick name of whoever set the topic.
    pub nick: String,
    /// When the topic was set, in milliseconds since the epoch.
    pub time_ms: i64,
}

impl Topic {
    /// Create a topic set by `nick` at `time_ms`.
    #[must_use]
    pub fn new(text: impl Into<String>, nick: impl Into<String>, time_ms: i64) -> Self {
        Self {
            text: text.into(),
            nick: nick.into(),
            time_ms,
        }
    }

    /// Whether a topic is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Snapshot of the users currently online, sorted for display.
///
/// The local user sorts first, everyone else by nick name ignoring case.
#[derive(Debug, Clone, Default)]
pub struct UserList {
    users: Vec<Arc<User>>,
}

impl UserList {
    /// Build a sorted list. `me` is placed first if present.
    #[must_use]
    pub fn sorted(mut users: Vec<Arc<User>>, me: UserId) -> Self {
        users.sort_by_cached_key(|u| (u.id() != me, u.nick().to_lowercase()));
        Self { users }
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// User at the given display position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<User>> {
        self.users.get(index)
    }

    /// Iterate in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<User>> {
        self.users.iter()
    }

    /// Find a user by nick name, ignoring case.
    #[must_use]
    pub fn find_by_nick(&self, nick: &str) -> Option<&Arc<User>> {
        self.users.iter().find(|u| u.nick().eq_ignore_ascii_case(nick))
    }
}
