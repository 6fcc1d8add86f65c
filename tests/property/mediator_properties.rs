//! Property-based tests for the mediator.
//!
//! Uses proptest to verify:
//! 1. The private message notification decision matches the visibility table
//!    for every combination of attached and visible surfaces.
//! 2. Changing to the current nick, with any surrounding whitespace, is a
//!    no-op that never reaches the engine.
//! 3. Blank text of any shape is rejected before the engine.
//! 4. History never holds more than its limit and keeps the newest lines.

use std::sync::Arc;

use lanchat::config::{ClientConfig, Settings};
use lanchat::engine::{ChatEngine, EngineListener};
use lanchat::engine::memory::InMemoryEngine;
use lanchat::facade::{ChatFacade, MediatorError, is_valid_nick};
use lanchat::history::{ChatHistory, PlainFormatter};
use lanchat::notify::{NotificationTarget, RecordingNotifier, RecordingToaster};
use lanchat::surface::StubSurface;
use lanchat::user::{User, UserId};
use proptest::prelude::*;

struct Client {
    facade: ChatFacade,
    engine: Arc<InMemoryEngine>,
    notifier: Arc<RecordingNotifier>,
    toaster: Arc<RecordingToaster>,
    kou: Arc<User>,
}

fn client(nick: &str) -> Client {
    let config = ClientConfig {
        nick: nick.to_string(),
        user_id: 1234,
        ..Default::default()
    };
    let settings = Settings::new(config);
    let engine = Arc::new(InMemoryEngine::new(Arc::clone(settings.me())));
    let kou = Arc::new(User::new("Kou", 1235));
    engine.add_user(Arc::clone(&kou));
    engine.log_on();
    engine.clear_calls();

    let notifier = Arc::new(RecordingNotifier::new());
    let toaster = Arc::new(RecordingToaster::new());
    let facade = ChatFacade::new(settings, engine.clone(), notifier.clone(), toaster.clone())
        .with_formatter(Arc::new(PlainFormatter));

    Client {
        facade,
        engine,
        notifier,
        toaster,
        kou,
    }
}

/// Surface state: absent, attached hidden, or attached visible.
fn arb_surface() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), Just(Some(false)), Just(Some(true))]
}

/// Strategy for nick names that pass validation.
fn arb_nick() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,10}".prop_filter("valid nick", |n| is_valid_nick(n))
}

/// Strategy for whitespace padding.
fn arb_padding() -> impl Strategy<Value = String> {
    "[ \t]{0,4}"
}

/// Strategy for text that is empty or whitespace only.
fn arb_blank() -> impl Strategy<Value = String> {
    "[ \t\r\n]{0,8}"
}

proptest! {
    #[test]
    fn private_notification_follows_visibility(
        main in arb_surface(),
        private in arb_surface(),
    ) {
        let c = client("Me");
        if let Some(visible) = main {
            c.facade.register_main_surface(Arc::new(StubSurface::new(visible)));
        }
        if let Some(visible) = private {
            c.facade.create_private_chat(&c.kou, Arc::new(StubSurface::new(visible)));
        }

        c.facade.private_message_arrived(UserId(1235), "<Kou>: hi", 0);

        let private_visible = private == Some(true);
        let main_visible = main == Some(true);
        let expect_unread = !private_visible;
        let expect_notified = !private_visible && !main_visible;

        prop_assert_eq!(c.kou.has_new_private_message(), expect_unread);
        prop_assert_eq!(
            c.notifier.raised_count(NotificationTarget::Private(UserId(1235))),
            usize::from(expect_notified)
        );
        prop_assert_eq!(
            c.engine.new_message_changes(),
            if expect_unread { vec![(UserId(1235), true)] } else { vec![] }
        );
    }

    #[test]
    fn main_notification_follows_visibility(main in arb_surface()) {
        let c = client("Me");
        if let Some(visible) = main {
            c.facade.register_main_surface(Arc::new(StubSurface::new(visible)));
        }

        c.facade.message_arrived(&c.kou, "<Kou>: hi", 0);

        prop_assert_eq!(
            c.notifier.raised_count(NotificationTarget::Main),
            usize::from(main != Some(true))
        );
    }

    #[test]
    fn changing_to_current_nick_is_a_no_op(
        nick in arb_nick(),
        before in arb_padding(),
        after in arb_padding(),
    ) {
        let c = client(&nick);
        let padded = format!("{before}{nick}{after}");

        prop_assert!(!c.facade.change_nick_name(&padded));
        prop_assert!(c.engine.calls().is_empty());
        prop_assert!(c.toaster.toasts().is_empty());
        prop_assert_eq!(c.facade.me().nick(), nick);
    }

    #[test]
    fn blank_text_never_reaches_the_engine(text in arb_blank()) {
        let c = client("Me");

        prop_assert_eq!(c.facade.send_message(&text), Err(MediatorError::EmptyMessage));
        prop_assert_eq!(
            c.facade.send_private_message(&text, &c.kou),
            Err(MediatorError::EmptyPrivateMessage)
        );
        prop_assert_eq!(
            c.facade.append_to_chat(&text, 0),
            Err(MediatorError::EmptyMessage)
        );
        prop_assert!(c.engine.calls().is_empty());
    }

    #[test]
    fn history_keeps_newest_lines_within_limit(
        max_lines in 1usize..20,
        lines in prop::collection::vec("[a-z]{1,8}", 0..50),
    ) {
        let history = ChatHistory::new(max_lines);
        for line in &lines {
            history.style_and_append(&PlainFormatter, line, 0);
        }

        let kept = lines.len().min(max_lines);
        prop_assert_eq!(history.len(), kept);
        prop_assert_eq!(history.contents(), lines[lines.len() - kept..].join("\n"));
    }
}
