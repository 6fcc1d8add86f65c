//! Integration tests for inbound message notifications.
//!
//! Drives the facade the way an engine would, through `EngineListener`,
//! while the front-end attaches, hides, and detaches surfaces.
//!
//! **Postconditions checked:**
//! 1. A visible conversation never raises a notification.
//! 2. A private message to a hidden chat always marks the sender unread.
//! 3. Viewing a private chat clears the unread state exactly once.

use std::sync::Arc;
use std::time::Duration;

use lanchat::config::{ClientConfig, Settings};
use lanchat::engine::{ChatEngine, EngineListener};
use lanchat::engine::memory::{EngineCall, InMemoryEngine};
use lanchat::facade::ChatFacade;
use lanchat::history::PlainFormatter;
use lanchat::notify::{
    NotificationTarget, RecordedNotification, RecordingNotifier, RecordingToaster,
};
use lanchat::surface::StubSurface;
use lanchat::user::{User, UserId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Client {
    facade: Arc<ChatFacade>,
    engine: Arc<InMemoryEngine>,
    notifier: Arc<RecordingNotifier>,
    kou: Arc<User>,
}

/// A logged-on client with one peer, "Kou" (1235), and no surfaces.
fn client() -> Client {
    let config = ClientConfig {
        nick: "Me".to_string(),
        user_id: 1234,
        app_name: "LanChat".to_string(),
        confirm_poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let settings = Settings::new(config);
    let engine = Arc::new(InMemoryEngine::new(Arc::clone(settings.me())));
    let kou = Arc::new(User::new("Kou", 1235));
    engine.add_user(Arc::clone(&kou));
    engine.log_on();
    engine.clear_calls();

    let notifier = Arc::new(RecordingNotifier::new());
    let facade = Arc::new(
        ChatFacade::new(
            settings,
            engine.clone(),
            notifier.clone(),
            Arc::new(RecordingToaster::new()),
        )
        .with_formatter(Arc::new(PlainFormatter)),
    );

    Client {
        facade,
        engine,
        notifier,
        kou,
    }
}

fn main_surface(client: &Client, visible: bool) -> Arc<StubSurface> {
    let surface = Arc::new(StubSurface::new(visible));
    client.facade.register_main_surface(surface.clone());
    surface
}

fn private_surface(client: &Client, visible: bool) -> Arc<StubSurface> {
    let surface = Arc::new(StubSurface::new(visible));
    client.facade.create_private_chat(&client.kou, surface.clone());
    surface
}

// ---------------------------------------------------------------------------
// Main chat
// ---------------------------------------------------------------------------

#[test]
fn main_message_while_backgrounded_notifies_and_is_kept() {
    let c = client();
    let main = main_surface(&c, false);

    c.facade.message_arrived(&c.kou, "<Kou>: anyone here?", 0);

    assert_eq!(c.notifier.raised_count(NotificationTarget::Main), 1);
    assert_eq!(main.lines(), vec!["<Kou>: anyone here?"]);
}

#[test]
fn main_message_after_resume_does_not_notify() {
    let c = client();
    let main = main_surface(&c, false);
    c.facade.message_arrived(&c.kou, "<Kou>: one", 0);

    main.set_visible(true);
    c.facade.reset_all_notifications();
    c.facade.message_arrived(&c.kou, "<Kou>: two", 0);

    assert_eq!(
        c.notifier.events(),
        vec![
            RecordedNotification::Raised(NotificationTarget::Main),
            RecordedNotification::ResetAll,
        ]
    );
    assert_eq!(main.lines(), vec!["<Kou>: one", "<Kou>: two"]);
}

#[test]
fn main_message_after_detach_notifies() {
    let c = client();
    main_surface(&c, true);
    c.facade.unregister_main_surface();

    c.facade.message_arrived(&c.kou, "<Kou>: hello?", 0);

    assert!(!c.facade.is_visible());
    assert_eq!(c.notifier.raised_count(NotificationTarget::Main), 1);
}

#[test]
fn messages_received_while_detached_are_replayed_on_attach() {
    let c = client();
    c.facade.message_arrived(&c.kou, "<Kou>: first", 0);
    c.facade.message_arrived(&c.kou, "<Kou>: second", 0);
    assert_eq!(c.notifier.raised_count(NotificationTarget::Main), 2);

    let main = main_surface(&c, true);

    assert_eq!(main.content_resets(), vec!["<Kou>: first\n<Kou>: second"]);
    assert!(main.lines().is_empty());
}

// ---------------------------------------------------------------------------
// Private chat
// ---------------------------------------------------------------------------

#[test]
fn private_message_with_everything_hidden_notifies_and_marks_unread() {
    let c = client();
    main_surface(&c, false);
    let private = private_surface(&c, false);

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: psst", 0);

    assert_eq!(
        c.notifier.raised_count(NotificationTarget::Private(UserId(1235))),
        1
    );
    assert!(c.kou.has_new_private_message());
    assert_eq!(c.engine.new_message_changes(), vec![(UserId(1235), true)]);
    assert_eq!(private.lines(), vec!["<Kou>: psst"]);
}

#[test]
fn private_message_without_private_chat_notifies() {
    let c = client();

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: psst", 0);

    assert_eq!(
        c.notifier.raised_count(NotificationTarget::Private(UserId(1235))),
        1
    );
    assert!(c.kou.has_new_private_message());
}

#[test]
fn private_message_with_visible_private_chat_is_silent() {
    let c = client();
    main_surface(&c, false);
    let private = private_surface(&c, true);

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: psst", 0);

    assert!(c.notifier.events().is_empty());
    assert!(!c.kou.has_new_private_message());
    assert!(c.engine.new_message_changes().is_empty());
    assert_eq!(private.lines(), vec!["<Kou>: psst"]);
}

#[test]
fn private_message_with_visible_main_chat_is_only_marked_unread() {
    let c = client();
    main_surface(&c, true);
    private_surface(&c, false);

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: psst", 0);

    assert!(c.notifier.events().is_empty());
    assert!(c.kou.has_new_private_message());
    assert_eq!(c.engine.new_message_changes(), vec![(UserId(1235), true)]);
}

#[test]
fn opening_private_chat_clears_unread_once() {
    let c = client();
    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: one", 0);
    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: two", 0);

    let private = private_surface(&c, true);
    c.facade.activated_private_chat(&c.kou);
    c.facade.activated_private_chat(&c.kou);

    assert!(!c.kou.has_new_private_message());
    assert_eq!(
        c.engine.new_message_changes(),
        vec![(UserId(1235), true), (UserId(1235), false)]
    );
    assert_eq!(private.content_resets(), vec!["<Kou>: one\n<Kou>: two"]);
    assert_eq!(
        c.notifier
            .withdrawn_count(NotificationTarget::Private(UserId(1235))),
        2
    );
}

#[test]
fn private_message_from_departed_user_is_dropped() {
    let c = client();
    c.engine.remove_user(UserId(1235));

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: bye", 0);

    assert!(c.notifier.events().is_empty());
    assert!(!c.kou.has_new_private_message());
}

#[test]
fn closing_private_chat_restores_notifications() {
    let c = client();
    private_surface(&c, true);
    c.facade.close_private_chat(&c.kou);

    c.facade
        .private_message_arrived(UserId(1235), "<Kou>: still there?", 0);

    assert!(c.kou.private_surface().is_none());
    assert_eq!(
        c.notifier.raised_count(NotificationTarget::Private(UserId(1235))),
        1
    );
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[test]
fn engine_thread_messages_race_with_surface_changes() {
    let c = client();
    let main = main_surface(&c, false);

    let writer = {
        let facade = Arc::clone(&c.facade);
        let kou = Arc::clone(&c.kou);
        std::thread::spawn(move || {
            for i in 0..100 {
                facade.message_arrived(&kou, &format!("<Kou>: {i}"), 0);
                facade.private_message_arrived(kou.id(), &format!("<Kou>: p{i}"), 0);
            }
        })
    };
    for i in 0..100 {
        main.set_visible(i % 2 == 0);
        let private = Arc::new(StubSurface::new(false));
        c.facade.create_private_chat(&c.kou, private);
        c.facade.close_private_chat(&c.kou);
    }
    writer.join().unwrap();

    // Every main message ended up on the surface exactly once.
    assert_eq!(main.lines().len(), 100);
    // Unread went false -> true once; nothing reset it.
    assert_eq!(c.engine.new_message_changes(), vec![(UserId(1235), true)]);
}

#[test]
fn concurrent_private_chat_creation_yields_one_surface() {
    let c = client();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let facade = Arc::clone(&c.facade);
            let kou = Arc::clone(&c.kou);
            std::thread::spawn(move || {
                facade.create_private_chat(&kou, Arc::new(StubSurface::new(false)))
            })
        })
        .collect();
    let attached: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &attached[0];
    assert!(attached.iter().all(|s| Arc::ptr_eq(s, first)));
    assert!(
        c.kou
            .private_surface()
            .is_some_and(|s| Arc::ptr_eq(&s, first))
    );
}

#[test]
fn log_off_stops_the_engine() {
    let c = client();
    c.facade.log_off();
    assert!(!c.facade.is_logged_on());
    assert_eq!(
        c.engine.calls(),
        vec![EngineCall::LogOff(false), EngineCall::Shutdown]
    );
}
