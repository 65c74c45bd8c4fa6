use std::time::Duration;

use chatsync::config::{DEFAULT_ENDPOINT, DEFAULT_TYPING_WINDOW_MS};
use chatsync::{Channel, Codec, ConnectionStatus, Session, SessionConfig, SessionHandle, SessionView};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("transport setup failed: {0}")]
    Transport(#[from] chatsync::TransportError),
    #[error("session ended: {0}")]
    Session(#[from] chatsync::SessionError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatsync", about = "Terminal client for a realtime chat room")]
struct Cli {
    #[arg(long, env = "CHATSYNC_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Display name to register with on startup.
    #[arg(long, env = "CHATSYNC_NAME")]
    name: Option<String>,

    #[arg(long, env = "CHATSYNC_TYPING_WINDOW_MS", default_value_t = DEFAULT_TYPING_WINDOW_MS)]
    typing_window_ms: u64,

    /// Outbound wire encoding: `binary` (protobuf) or `text` (JSON).
    #[arg(long, env = "CHATSYNC_CODEC", default_value = "binary")]
    codec: Codec,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Quit,
    Who,
    Name(&'a str),
    Say(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    match trimmed {
        "/quit" => Line::Quit,
        "/who" => Line::Who,
        _ => match trimmed.strip_prefix("/name ") {
            Some(name) => Line::Name(name.trim()),
            None => Line::Say(line),
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = SessionConfig::from_env()
        .with_endpoint(cli.endpoint)
        .with_typing_window(Duration::from_millis(cli.typing_window_ms))
        .with_codec(cli.codec);

    let (channel, outbox) = Channel::new();
    let session = Session::start(channel.clone(), &config);
    let transport = channel.connect(&config, outbox)?;
    info!(endpoint = %config.endpoint, codec = %config.codec, "chatsync: started");

    if let Some(name) = cli.name {
        session.set_identity(name)?;
    }

    let printer = tokio::spawn(print_updates(session.watch()));
    let result = read_input(&session).await;

    let stopped = session.shutdown().await;
    transport.shutdown().await;
    if let Err(e) = printer.await {
        warn!(error = %e, "chatsync: printer task failed");
    }

    result?;
    stopped?;
    Ok(())
}

async fn read_input(session: &SessionHandle) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Line::Blank => {}
            Line::Quit => break,
            Line::Who => print_who(&session.snapshot().await?),
            Line::Name(name) => session.set_identity(name)?,
            Line::Say(text) => {
                session.update_draft(text)?;
                session.send_message()?;
            }
        }
    }
    Ok(())
}

fn print_who(view: &SessionView) {
    let stale = if view.presence_stale { " (stale)" } else { "" };
    println!("online ({}){stale}: {}", view.online_count(), view.online_users.join(", "));
}

async fn print_updates(mut view: watch::Receiver<SessionView>) {
    let mut printed = 0;
    let mut typing: Option<String> = None;
    let mut connection = ConnectionStatus::Disconnected;

    while view.changed().await.is_ok() {
        let current = view.borrow_and_update().clone();

        for message in current.messages.iter().skip(printed) {
            let marker = if current.is_own(message) { '*' } else { ' ' };
            println!("{marker} {}: {}", message.name, message.message);
        }
        printed = current.messages.len();

        if current.typing != typing {
            if let Some(name) = &current.typing {
                eprintln!("{name} is typing...");
            }
            typing = current.typing;
        }

        if current.connection != connection {
            eprintln!("[{:?}]", current.connection);
            connection = current.connection;
        }
    }
}
