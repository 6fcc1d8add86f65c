//! `LanChat`: headless console front-end.
//!
//! Drives the mediator with an in-memory engine so the notification and
//! file-transfer flows can be exercised from a terminal. Peers are
//! simulated with `/sim` commands. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/lanchat/config.toml`).
//!
//! ```bash
//! cargo run --bin lanchat -- --nick Kou
//! LANCHAT_NICK=Kou LANCHAT_LOG=debug cargo run
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use lanchat::config::{CliArgs, ClientConfig, Settings};
use lanchat::engine::EngineListener;
use lanchat::engine::memory::InMemoryEngine;
use lanchat::facade::ChatFacade;
use lanchat::notify::{Toaster, TracingNotifier};
use lanchat::surface::ConversationSurface;
use lanchat::transfer::{FileTransferOffer, TransferDecision, TransferListener};
use lanchat::user::{Topic, User};

const HELP: &str = "\
commands:
  <text>                     send to the main chat
  /msg <nick> <text>         send a private message
  /query <nick>              open a private chat
  /close <nick>              close a private chat
  /nick <nick>               change your nick name
  /send <nick> <path>        offer a file
  /accept <nick> <id>        accept a file offer
  /reject <nick> <id>        reject a file offer
  /hide, /show               hide or show the main chat
  /read                      mark everything as read
  /who                       list users
  /sim join <nick> <id>      a peer logs on
  /sim say <nick> <text>     a peer writes in the main chat
  /sim private <nick> <text> a peer writes to you
  /sim topic <nick> <text>   a peer changes the topic
  /sim offer <nick> <id> <file> <size>
                             a peer offers a file
  /sim withdraw <nick> <id>  a peer cancels a file offer
  /sim progress <nick> <id> <bytes>
                             part of an accepted file arrives
  /quit                      log off and exit";

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!(nick = %config.nick, user_id = config.user_id, "lanchat starting");

    let settings = Settings::new(config);
    let engine = Arc::new(InMemoryEngine::new(Arc::clone(settings.me())));
    let facade = Arc::new(ChatFacade::new(
        settings,
        engine.clone(),
        Arc::new(TracingNotifier),
        Arc::new(ConsoleToaster),
    ));

    facade.register_main_surface(Arc::new(ConsoleSurface::new("", true)));
    facade.log_on();
    facade.show_topic();
    println!("{HELP}");

    let result = run_console(&facade, &engine).await;

    facade.log_off();
    tracing::info!("lanchat exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs go to a file so they do not interleave with the conversation.
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("lanchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Read commands from stdin until `/quit` or end of input.
async fn run_console(facade: &Arc<ChatFacade>, engine: &Arc<InMemoryEngine>) -> io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        handle_line(facade, engine, line);
    }
    Ok(())
}

fn handle_line(facade: &Arc<ChatFacade>, engine: &Arc<InMemoryEngine>, line: &str) {
    let Some(command) = line.strip_prefix('/') else {
        if let Err(e) = facade.send_message(line) {
            eprintln!("{e}");
        }
        return;
    };

    let (name, rest) = split_word(command);
    match name {
        "msg" => {
            let (nick, text) = split_word(rest);
            if let Some(user) = find_user(facade, nick)
                && let Err(e) = facade.send_private_message(text, &user)
            {
                eprintln!("{e}");
            }
        }
        "query" => {
            if let Some(user) = find_user(facade, rest) {
                let label = format!("[{}] ", user.nick());
                facade.create_private_chat(&user, Arc::new(ConsoleSurface::new(label, true)));
                facade.activated_private_chat(&user);
            }
        }
        "close" => {
            if let Some(user) = find_user(facade, rest) {
                facade.close_private_chat(&user);
            }
        }
        "nick" => {
            facade.change_nick_name(rest);
        }
        "send" => {
            let (nick, path) = split_word(rest);
            if let Some(user) = find_user(facade, nick) {
                facade.send_file(&user, Path::new(path));
            }
        }
        "accept" | "reject" => decide_offer(facade, name == "accept", rest),
        "hide" | "show" => {
            let visible = name == "show";
            facade.register_main_surface(Arc::new(ConsoleSurface::new("", visible)));
        }
        "read" => facade.reset_all_notifications(),
        "who" => {
            for user in facade.user_list().iter() {
                let unread = if user.has_new_private_message() { " *" } else { "" };
                println!("  {} ({}){unread}", user.nick(), user.id());
            }
        }
        "sim" => simulate(facade, engine, rest),
        _ => println!("{HELP}"),
    }
}

fn decide_offer(facade: &ChatFacade, accept: bool, args: &str) {
    let (nick, id) = split_word(args);
    let Some(user) = find_user(facade, nick) else {
        return;
    };
    let Ok(id) = id.parse::<u32>() else {
        eprintln!("Invalid offer id: {id}");
        return;
    };
    let Some(offer) = facade.file_offer(user.id(), id) else {
        eprintln!("No file offer {id} from {nick}");
        return;
    };
    let decided = if accept { offer.accept() } else { offer.reject() };
    if !decided {
        eprintln!("File offer {id} was already {}", offer.decision());
    }
}

/// Play the part of the network for `/sim` commands.
fn simulate(facade: &Arc<ChatFacade>, engine: &Arc<InMemoryEngine>, args: &str) {
    let (name, rest) = split_word(args);
    match name {
        "join" => {
            let (nick, id) = split_word(rest);
            match id.parse::<u32>() {
                Ok(id) => engine.add_user(Arc::new(User::new(nick, id))),
                Err(_) => eprintln!("Invalid user id: {id}"),
            }
        }
        "say" => {
            let (nick, text) = split_word(rest);
            if let Some(user) = find_user(facade, nick) {
                facade.message_arrived(&user, &format!("<{nick}>: {text}"), 0);
            }
        }
        "private" => {
            let (nick, text) = split_word(rest);
            if let Some(user) = find_user(facade, nick) {
                facade.private_message_arrived(user.id(), &format!("<{nick}>: {text}"), 0);
            }
        }
        "topic" => {
            let (nick, text) = split_word(rest);
            let time_ms = chrono::Utc::now().timestamp_millis();
            engine.set_topic(Topic::new(text, nick, time_ms));
            facade.topic_changed();
        }
        "offer" => simulate_offer(facade, engine, rest),
        "progress" => simulate_progress(facade, engine, rest),
        "withdraw" => {
            let (nick, id) = split_word(rest);
            let offer = find_user(facade, nick)
                .zip(id.parse::<u32>().ok())
                .and_then(|(user, id)| facade.file_offer(user.id(), id));
            if let Some(offer) = offer {
                offer.cancel();
            }
        }
        _ => println!("{HELP}"),
    }
}

fn simulate_offer(facade: &Arc<ChatFacade>, engine: &Arc<InMemoryEngine>, args: &str) {
    let (nick, rest) = split_word(args);
    let (id, rest) = split_word(rest);
    let (file_name, size) = split_word(rest);
    let Some(user) = find_user(facade, nick) else {
        return;
    };
    let (Ok(id), Ok(size)) = (id.parse::<u32>(), size.parse::<u64>()) else {
        eprintln!("Usage: /sim offer <nick> <id> <file> <size>");
        return;
    };

    let offer = Arc::new(FileTransferOffer::new(id, user, file_name, size));
    offer.register_transfer_listener(Arc::new(ConsoleProgress));
    engine.add_offer(Arc::clone(&offer));

    let facade = Arc::clone(facade);
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || {
        let decision = facade.file_offer_arrived(&offer);
        match offer.file() {
            Some(path) if decision == TransferDecision::Accepted => {
                println!("*** File transfer {id} accepted, saving to {}", path.display());
            }
            _ => {
                println!("*** File transfer {id} {decision}");
                engine.remove_offer(offer.sender().id(), id);
            }
        }
    });
}

/// The engine received `bytes` of an accepted offer.
fn simulate_progress(facade: &ChatFacade, engine: &InMemoryEngine, args: &str) {
    let (nick, rest) = split_word(args);
    let (id, bytes) = split_word(rest);
    let Some(user) = find_user(facade, nick) else {
        return;
    };
    let (Ok(id), Ok(bytes)) = (id.parse::<u32>(), bytes.parse::<u64>()) else {
        eprintln!("Usage: /sim progress <nick> <id> <bytes>");
        return;
    };
    let Some(offer) = facade.file_offer(user.id(), id) else {
        eprintln!("No file offer {id} from {nick}");
        return;
    };

    offer.update_progress(bytes);
    if offer.transferred() >= offer.size() {
        engine.remove_offer(user.id(), id);
    }
}

fn find_user(facade: &ChatFacade, nick: &str) -> Option<Arc<User>> {
    let user = facade.user_list().find_by_nick(nick).cloned();
    if user.is_none() {
        eprintln!("No such user: {nick}");
    }
    user
}

/// Split off the first whitespace-separated word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.split_once(char::is_whitespace)
        .map_or((s, ""), |(word, rest)| (word, rest.trim_start()))
}

/// Surface printing to stdout.
struct ConsoleSurface {
    label: String,
    visible: AtomicBool,
}

impl ConsoleSurface {
    fn new(label: impl Into<String>, visible: bool) -> Self {
        Self {
            label: label.into(),
            visible: AtomicBool::new(visible),
        }
    }
}

impl ConversationSurface for ConsoleSurface {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    fn append_message(&self, text: &str) {
        if self.is_visible() {
            println!("{}{text}", self.label);
        }
    }

    fn update_title(&self, title: &str) {
        println!("== {title} ==");
    }

    fn replace_content(&self, _content: &str) {}
}

/// Transfer listener printing progress to stdout.
struct ConsoleProgress;

impl TransferListener for ConsoleProgress {
    fn progress_changed(&self, offer: &FileTransferOffer, _transferred: u64) {
        println!("*** {} {}%", offer.file_name(), offer.percent());
    }
}

/// Toaster printing to stderr.
struct ConsoleToaster;

impl Toaster for ConsoleToaster {
    fn toast(&self, text: &str) {
        eprintln!("! {text}");
    }
}
