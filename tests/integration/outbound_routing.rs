//! Integration tests for user actions routed through the facade.
//!
//! Covers sending to the main and private chats, nick changes, and file
//! offers, including how engine failures reach the user.

use std::sync::Arc;
use std::time::Duration;

use lanchat::config::{ClientConfig, Settings};
use lanchat::engine::memory::{EngineCall, InMemoryEngine, Operation};
use lanchat::engine::{ChatEngine, ConnectionListener, EngineError};
use lanchat::facade::{ChatFacade, MediatorError};
use lanchat::history::PlainFormatter;
use lanchat::notify::{RecordingNotifier, RecordingToaster};
use lanchat::surface::StubSurface;
use lanchat::user::{Topic, User, UserId};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Client {
    facade: ChatFacade,
    engine: Arc<InMemoryEngine>,
    toaster: Arc<RecordingToaster>,
    main: Arc<StubSurface>,
    kou: Arc<User>,
}

/// A logged-on client "Me" with one peer "Kou" and a visible main chat.
fn client() -> Client {
    let me = Arc::new(User::new("Me", 1234));
    let config = ClientConfig {
        nick: "Me".to_string(),
        user_id: 1234,
        app_name: "LanChat".to_string(),
        confirm_poll_interval: Duration::from_millis(10),
        ..Default::default()
    };
    let engine = Arc::new(InMemoryEngine::new(Arc::clone(&me)));
    let kou = Arc::new(User::new("Kou", 1235));
    engine.add_user(Arc::clone(&kou));
    engine.log_on();
    engine.clear_calls();

    let toaster = Arc::new(RecordingToaster::new());
    let facade = ChatFacade::new(
        Settings::with_me(me, config),
        engine.clone(),
        Arc::new(RecordingNotifier::new()),
        toaster.clone(),
    )
    .with_formatter(Arc::new(PlainFormatter));

    let main = Arc::new(StubSurface::new(true));
    facade.register_main_surface(main.clone());

    Client {
        facade,
        engine,
        toaster,
        main,
        kou,
    }
}

fn open_private_chat(client: &Client) -> Arc<StubSurface> {
    let surface = Arc::new(StubSurface::new(true));
    client.facade.create_private_chat(&client.kou, surface.clone());
    surface
}

// ---------------------------------------------------------------------------
// Main chat
// ---------------------------------------------------------------------------

#[test]
fn own_messages_are_shown_in_order() {
    let c = client();
    c.facade.send_message("one").unwrap();
    c.facade.send_message("two").unwrap();

    assert_eq!(c.main.lines(), vec!["<Me>: one", "<Me>: two"]);
    assert_eq!(
        c.engine.calls(),
        vec![
            EngineCall::SendChatMessage("one".to_string()),
            EngineCall::SendChatMessage("two".to_string()),
        ]
    );
}

#[test]
fn sending_while_logged_off_shows_the_engine_error() {
    let c = client();
    c.engine.log_off(false);

    c.facade.send_message("anyone?").unwrap();

    assert_eq!(
        c.main.lines(),
        vec!["*** You can not do that when you are not connected"]
    );
}

#[test]
fn blank_messages_never_reach_the_engine() {
    let c = client();
    for text in ["", " ", "\t\n"] {
        assert_eq!(c.facade.send_message(text), Err(MediatorError::EmptyMessage));
        assert_eq!(
            c.facade.send_private_message(text, &c.kou),
            Err(MediatorError::EmptyPrivateMessage)
        );
    }
    assert!(c.engine.calls().is_empty());
    assert!(c.main.lines().is_empty());
}

// ---------------------------------------------------------------------------
// Private chat
// ---------------------------------------------------------------------------

#[test]
fn private_messages_go_to_the_private_chat_only() {
    let c = client();
    let private = open_private_chat(&c);

    c.facade.send_private_message("psst", &c.kou).unwrap();

    assert_eq!(private.lines(), vec!["<Me>: psst"]);
    assert!(c.main.lines().is_empty());
    assert_eq!(
        c.engine.calls(),
        vec![EngineCall::SendPrivateMessage {
            user: UserId(1235),
            text: "psst".to_string()
        }]
    );
}

#[test]
fn private_message_to_away_user_explains_in_private_chat() {
    let c = client();
    let private = open_private_chat(&c);
    c.kou.set_away(Some("Lunch".to_string()));

    c.facade.send_private_message("psst", &c.kou).unwrap();

    assert_eq!(
        private.lines(),
        vec!["*** You can not send a private chat message to a user that is away"]
    );
    assert!(c.main.lines().is_empty());
}

#[test]
fn private_message_to_departed_user_explains_in_private_chat() {
    let c = client();
    let private = open_private_chat(&c);
    c.engine.remove_user(UserId(1235));

    c.facade.send_private_message("psst", &c.kou).unwrap();

    assert_eq!(
        private.lines(),
        vec!["*** You can not send a private chat message to a user that is offline"]
    );
}

#[test]
fn private_history_is_kept_while_chat_is_closed() {
    let c = client();
    c.facade.send_private_message("before", &c.kou).unwrap();

    let private = open_private_chat(&c);
    c.facade.close_private_chat(&c.kou);
    c.facade.send_private_message("while closed", &c.kou).unwrap();
    let reopened = open_private_chat(&c);

    assert_eq!(private.content_resets(), vec!["<Me>: before"]);
    assert_eq!(
        reopened.content_resets(),
        vec!["<Me>: before\n<Me>: while closed"]
    );
}

#[test]
fn private_title_follows_away_state() {
    let c = client();
    let private = open_private_chat(&c);
    c.kou.set_away(Some("Lunch".to_string()));
    c.facade.show_private_title(&c.kou);

    assert_eq!(
        private.titles(),
        vec!["Kou - LanChat", "Kou (away: Lunch) - LanChat"]
    );
}

// ---------------------------------------------------------------------------
// Nick names
// ---------------------------------------------------------------------------

#[test]
fn nick_change_updates_user_list_and_title() {
    let c = client();
    c.engine.set_topic(Topic::new("Friday", "Kou", 0));

    assert!(c.facade.change_nick_name("  Bob  "));

    assert_eq!(c.facade.me().nick(), "Bob");
    assert!(c.facade.user_list().find_by_nick("bob").is_some());
    assert_eq!(c.main.lines(), vec!["*** You changed nick to Bob"]);
    assert_eq!(c.main.titles(), vec!["Bob - Topic: Friday (Kou) - LanChat"]);
}

#[test]
fn nick_taken_case_insensitively_is_refused() {
    let c = client();
    assert!(!c.facade.change_nick_name("KOU"));
    assert_eq!(c.facade.me().nick(), "Me");
    assert_eq!(
        c.toaster.toasts(),
        vec!["The nick name is in use by someone else."]
    );
}

#[test]
fn changing_back_and_forth_works() {
    let c = client();
    assert!(c.facade.change_nick_name("Bob"));
    assert!(!c.facade.change_nick_name("Bob"));
    assert!(c.facade.change_nick_name("Me"));
    assert!(c.toaster.toasts().is_empty());
}

#[test]
fn engine_refusal_is_toasted() {
    let c = client();
    c.engine.fail(
        Operation::ChangeMyNick,
        EngineError::Command("Nick change not allowed right now".to_string()),
    );

    assert!(!c.facade.change_nick_name("Bob"));
    assert_eq!(c.facade.me().nick(), "Me");
    assert_eq!(
        c.toaster.latest().as_deref(),
        Some("Nick change not allowed right now")
    );
}

// ---------------------------------------------------------------------------
// Files and connection
// ---------------------------------------------------------------------------

#[test]
fn offering_a_missing_file_is_toasted() {
    let c = client();
    let missing = std::env::temp_dir().join("lanchat-does-not-exist.bin");

    c.facade.send_file(&c.kou, &missing);

    assert_eq!(
        c.toaster.latest(),
        Some(format!("Could not find the file {}", missing.display()))
    );
}

#[derive(Default)]
struct ConnectionLog(Mutex<Vec<bool>>);

impl ConnectionListener for ConnectionLog {
    fn connection_changed(&self, connected: bool) {
        self.0.lock().push(connected);
    }
}

#[test]
fn connection_listeners_see_log_off() {
    let c = client();
    let log = Arc::new(ConnectionLog::default());
    c.facade.register_connection_listener(log.clone());

    c.facade.log_off();
    c.facade.log_on();

    // Listeners are dropped on shutdown.
    assert_eq!(*log.0.lock(), vec![false]);
    assert!(c.facade.is_logged_on());
}

#[test]
fn typing_state_is_forwarded() {
    let c = client();
    c.facade.update_me_writing(true);
    assert_eq!(c.engine.calls(), vec![EngineCall::UpdateMeWriting(true)]);
}
