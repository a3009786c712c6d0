//! # Bot Module
//!
//! The chat-facing side of rolldeck: who is talking, where, with which
//! rights, and where replies go.
//!
//! ## Components
//!
//! - [`server`] - [`DiceBot`], the front door that turns messages into replies
//! - [`context`] - per-invocation [`Context`] and the [`IncomingMessage`] input
//! - [`public`] - command prefix recognition
//! - [`roles`] - role levels, write policies and [`has_permission`](roles::has_permission)
//! - [`outbox`] - the [`Outbox`] sink and a recording implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolldeck::bot::{DiceBot, IncomingMessage};
//! use rolldeck::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let bot = DiceBot::new(config);
//!     if let Some(reply) = bot.handle_message(IncomingMessage::new("table-1", "u1", ".r 3d6"))? {
//!         println!("{}", reply.public);
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod outbox;
pub mod public;
pub mod roles;
pub mod server;

pub use context::{Context, IncomingMessage};
pub use outbox::{Destination, OutgoingMessage, Outbox, RecordingOutbox};
pub use public::{CommandParser, ParsedMessage};
pub use server::{DiceBot, DiceBotBuilder, RandomFactory, Reply};
