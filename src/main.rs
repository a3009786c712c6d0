//! Binary entrypoint for the rolldeck CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and a card file with two sample cards
//! - `roll <command>` - run one command (without prefix) and print the reply
//! - `repl` - read commands from stdin, one per line
//! - `keys` - list every custom text key and the variables it receives
//! - `cards [filter]` - list stored cards
//!
//! See the library crate docs for module-level details: `rolldeck::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use rolldeck::bot::{DiceBot, IncomingMessage, RecordingOutbox};
use rolldeck::card::{Card, CardQuery, CardStore, CardType, MemoryCardStore};
use rolldeck::config::Config;
use rolldeck::text::CustomTextKey;

#[derive(Parser)]
#[command(name = "rolldeck")]
#[command(about = "Dice commands and card keeping for tabletop chat")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(clap::Args, Clone)]
struct Speaker {
    /// Channel the command is issued in
    #[arg(long, default_value = "cli")]
    channel: String,
    /// User id of the invoker
    #[arg(long, default_value = "local")]
    user: String,
    /// Display name used in replies (defaults to the user id)
    #[arg(long)]
    name: Option<String>,
    /// Treat the message as a direct message
    #[arg(long)]
    direct: bool,
    /// Seed the dice for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter configuration and card file
    Init,
    /// Run a single command, e.g. `rolldeck roll "sc 1/1d6"`
    Roll {
        /// Command text; a leading prefix is optional
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
        #[command(flatten)]
        speaker: Speaker,
    },
    /// Interactive session; `/user <id>`, `/channel <id>` and `/quit` are local commands
    Repl {
        #[command(flatten)]
        speaker: Speaker,
    },
    /// List custom text keys
    Keys,
    /// List stored cards
    Cards {
        /// Case-insensitive name filter
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init | Commands::Keys => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Initializing new rolldeck configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);

            let cfg = Config::default();
            let store = MemoryCardStore::open(cfg.storage.cards_path())?;
            for card in sample_cards() {
                if store.get_card(&card.name)?.is_none() {
                    store.save_card(card)?;
                }
            }
            info!("Card file ready at {}", cfg.storage.cards_path().display());
        }
        Commands::Roll { command, speaker } => {
            let config = load_or_default(pre_config, &cli.config);
            let outbox = Arc::new(RecordingOutbox::new());
            let bot = build_bot(config, &speaker, outbox.clone())?;
            let text = with_prefix(&bot, &command.join(" "));
            bot.handle_message(message(&speaker, &speaker.channel, &speaker.user, text))?;
            print_outbox(&outbox);
        }
        Commands::Repl { speaker } => {
            let config = load_or_default(pre_config, &cli.config);
            let outbox = Arc::new(RecordingOutbox::new());
            let bot = build_bot(config, &speaker, outbox.clone())?;
            let mut channel = speaker.channel.clone();
            let mut user = speaker.user.clone();
            println!("rolldeck {} - /quit to leave", env!("CARGO_PKG_VERSION"));

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(local) = line.strip_prefix('/') {
                    let mut parts = local.splitn(2, ' ');
                    match (parts.next(), parts.next().map(str::trim)) {
                        (Some("quit"), _) | (Some("exit"), _) => break,
                        (Some("user"), Some(id)) if !id.is_empty() => user = id.to_string(),
                        (Some("channel"), Some(id)) if !id.is_empty() => channel = id.to_string(),
                        _ => println!("local commands: /user <id>, /channel <id>, /quit"),
                    }
                    continue;
                }
                let text = with_prefix(&bot, line);
                if let Err(e) = bot.handle_message(message(&speaker, &channel, &user, text)) {
                    println!("error: {}", e);
                }
                print_outbox(&outbox);
            }
        }
        Commands::Keys => {
            for key in CustomTextKey::ALL {
                println!("{:<18} {}", key.as_str(), key.variables());
            }
        }
        Commands::Cards { filter } => {
            let config = load_or_default(pre_config, &cli.config);
            let store = MemoryCardStore::open(config.storage.cards_path())?;
            let query = CardQuery {
                name: filter,
                ..Default::default()
            };
            let cards = store.query_card(&query)?;
            if cards.is_empty() {
                println!("no cards");
            }
            for card in cards {
                let entries: Vec<String> = card
                    .visible_entries()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                let template = if card.is_template { " (template)" } else { "" };
                println!("{} [{}]{}: {}", card.name, card.card_type, template, entries.join(" "));
            }
        }
    }

    Ok(())
}

fn load_or_default(config: Option<Config>, path: &str) -> Config {
    config.unwrap_or_else(|| {
        warn!("No usable config at {}; using defaults (run `rolldeck init`)", path);
        Config::default()
    })
}

fn build_bot(config: Config, speaker: &Speaker, outbox: Arc<RecordingOutbox>) -> Result<DiceBot> {
    let store = Arc::new(MemoryCardStore::open(config.storage.cards_path())?);
    let builder = DiceBot::builder(config).store(store).outbox(outbox);
    let builder = match speaker.seed {
        Some(seed) => builder.seeded(seed),
        None => builder,
    };
    Ok(builder.build())
}

/// The CLI accepts commands with or without a prefix.
fn with_prefix(bot: &DiceBot, text: &str) -> String {
    let prefixes = &bot.config().bot.command_prefixes;
    if prefixes.iter().any(|p| !p.is_empty() && text.starts_with(p.as_str())) {
        return text.to_string();
    }
    let prefix = prefixes.iter().find(|p| !p.is_empty()).map(String::as_str).unwrap_or(".");
    format!("{}{}", prefix, text)
}

fn message(speaker: &Speaker, channel: &str, user: &str, text: String) -> IncomingMessage {
    let mut msg = IncomingMessage::new(channel, user, text);
    if user == speaker.user {
        if let Some(name) = &speaker.name {
            msg = msg.from_user(name.clone());
        }
    }
    if speaker.direct {
        msg = msg.direct();
    }
    msg
}

fn print_outbox(outbox: &RecordingOutbox) {
    use rolldeck::bot::Destination;
    for sent in outbox.take() {
        match sent.to {
            Destination::Channel(_) => println!("{}", sent.text),
            Destination::User(id) => println!("[to {}] {}", id, sent.text),
        }
    }
}

fn sample_cards() -> Vec<Card> {
    let alice = Card::new("Alice", CardType::Coc)
        .with_entry("sanity", 60)
        .with_entry("hp", 11)
        .with_entry("spot", 45)
        .with_entry("library", 50)
        .with_entry("dex", 55);
    let bob = Card::new("Bob", CardType::Dnd)
        .with_entry("hp", 24)
        .with_entry("dex", 14)
        .with_entry("str", 16);
    vec![alice, bob]
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // -v beats the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Warn),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());
    match file {
        Some(f) => {
            let file = std::sync::Mutex::new(f);
            let is_tty = atty::is(atty::Stream::Stderr);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = file.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                // keep the terminal quiet when stderr is redirected
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
