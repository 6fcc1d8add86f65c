//! Conversation surfaces and the registry tracking which ones are attached.
//!
//! A surface is whatever currently displays a conversation: the main chat
//! or a private chat with one user. Surfaces come and go with the
//! front-end's lifecycle, so "no surface attached" is a normal state and
//! every query answers `false` for it instead of failing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::history::ChatHistory;
use crate::user::{User, UserId};

/// Capability exposed by a conversation window.
///
/// Implementations must be callable from any thread. Visibility is read
/// from engine threads while the front-end mutates it.
pub trait ConversationSurface: Send + Sync {
    /// Whether the surface is currently shown to the user.
    fn is_visible(&self) -> bool;

    /// Whether the surface has input focus. Defaults to visibility.
    fn is_focused(&self) -> bool {
        self.is_visible()
    }

    /// Append one styled line.
    fn append_message(&self, text: &str);

    /// Replace the window title.
    fn update_title(&self, title: &str);

    /// Replace everything shown with `content` (buffered history).
    fn replace_content(&self, content: &str);
}

/// In-memory surface that records what it was asked to show.
///
/// Used by tests and by the headless binary's "visible" toggle.
#[derive(Debug, Default)]
pub struct StubSurface {
    visible: AtomicBool,
    lines: Mutex<Vec<String>>,
    titles: Mutex<Vec<String>>,
    content_resets: Mutex<Vec<String>>,
}

impl StubSurface {
    /// Create a surface with the given initial visibility.
    #[must_use]
    pub fn new(visible: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
            ..Self::default()
        }
    }

    /// Change visibility, as the front-end would on pause/resume.
    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Lines appended since creation (history resets not included).
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Every title set, in order.
    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().clone()
    }

    /// Every content reset, in order.
    #[must_use]
    pub fn content_resets(&self) -> Vec<String> {
        self.content_resets.lock().clone()
    }
}

impl ConversationSurface for StubSurface {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn append_message(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }

    fn update_title(&self, title: &str) {
        self.titles.lock().push(title.to_string());
    }

    fn replace_content(&self, content: &str) {
        self.content_resets.lock().push(content.to_string());
    }
}

/// Tracks the attached main surface and one private surface per user.
///
/// Safe to query from any thread. Locks are never held while calling into
/// a surface.
#[derive(Default)]
pub struct SurfaceRegistry {
    main: RwLock<Option<Arc<dyn ConversationSurface>>>,
    private: RwLock<HashMap<UserId, Arc<dyn ConversationSurface>>>,
}

impl SurfaceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the main surface and fill it with `history`.
    ///
    /// Any previously attached main surface is replaced and returned.
    pub fn attach_main(
        &self,
        surface: Arc<dyn ConversationSurface>,
        history: &ChatHistory,
    ) -> Option<Arc<dyn ConversationSurface>> {
        let previous = self.main.write().replace(Arc::clone(&surface));
        surface.replace_content(&history.contents());
        tracing::debug!(replaced = previous.is_some(), "main surface attached");
        previous
    }

    /// Detach the main surface. Does nothing if none is attached.
    pub fn detach_main(&self) -> Option<Arc<dyn ConversationSurface>> {
        let previous = self.main.write().take();
        if previous.is_some() {
            tracing::debug!("main surface detached");
        }
        previous
    }

    /// The attached main surface, if any.
    #[must_use]
    pub fn main(&self) -> Option<Arc<dyn ConversationSurface>> {
        self.main.read().clone()
    }

    /// Whether a main surface is attached and visible.
    #[must_use]
    pub fn is_main_visible(&self) -> bool {
        self.main().is_some_and(|s| s.is_visible())
    }

    /// Whether a main surface is attached and focused.
    #[must_use]
    pub fn is_main_focused(&self) -> bool {
        self.main().is_some_and(|s| s.is_focused())
    }

    /// Attach a private surface for `user` unless one is already attached.
    ///
    /// The first surface wins: if one exists it is returned and `surface`
    /// is dropped. Returns the surface now attached and whether it is the
    /// one passed in.
    pub fn attach_private(
        &self,
        user: &User,
        surface: Arc<dyn ConversationSurface>,
    ) -> (Arc<dyn ConversationSurface>, bool) {
        let (attached, inserted) = match self.private.write().entry(user.id()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => (Arc::clone(slot.insert(surface)), true),
        };
        if inserted {
            user.set_private_surface(Some(&attached));
            tracing::debug!(user_id = %user.id(), "private surface attached");
        }
        (attached, inserted)
    }

    /// Detach the private surface for `user`. Does nothing if none.
    pub fn detach_private(&self, user: &User) -> Option<Arc<dyn ConversationSurface>> {
        let previous = self.private.write().remove(&user.id());
        if previous.is_some() {
            user.set_private_surface(None);
            tracing::debug!(user_id = %user.id(), "private surface detached");
        }
        previous
    }

    /// The private surface attached for `user_id`, if any.
    #[must_use]
    pub fn private(&self, user_id: UserId) -> Option<Arc<dyn ConversationSurface>> {
        self.private.read().get(&user_id).cloned()
    }

    /// Whether a private surface for `user_id` is attached and visible.
    #[must_use]
    pub fn is_private_visible(&self, user_id: UserId) -> bool {
        self.private(user_id).is_some_and(|s| s.is_visible())
    }
}
