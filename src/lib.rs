//! # Rolldeck - dice commands and text generation for tabletop chat bots
//!
//! Rolldeck interprets dice commands typed in a chat channel (`.r 3d6+2`,
//! `.sc 1/1d6`, `.nn Alice`), reads and updates player character cards, and
//! answers with text drawn from per-channel, weighted, templated tables.
//!
//! ## Features
//!
//! - **Dice expressions**: `NdM`, keep-highest/lowest, arithmetic, `N#` repeats, hidden rolls.
//! - **Special dice**: card linking (`nn`), opposed rolls (`vs`), death saves (`ds`),
//!   skill growth (`en`), initiative (`ri`), sanity checks (`sc`), card entries (`st`).
//! - **Three-phase commands**: every command rolls, then applies to cards, then renders.
//!   Replays with the same random source give the same result.
//! - **Write policies**: per-channel, per-feature control over who may change cards.
//! - **Custom texts**: every reply comes from a keyed, weighted, mustache-style table
//!   that channels and plugins can override.
//! - **Plugins**: extra commands, texts, chat replies and card watchers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rolldeck::bot::{DiceBot, IncomingMessage};
//! use rolldeck::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let bot = DiceBot::new(config);
//!     let reply = bot.handle_message(IncomingMessage::new("table-1", "u1", ".r 1d20+3"))?;
//!     if let Some(reply) = reply {
//!         println!("{}", reply.public);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bot`] - message front door, contexts, roles and the outbox
//! - [`engine`] - trigger table and the command lifecycle
//! - [`special`] - built-in command variants
//! - [`dice`] - expression parsing, rolling and success levels
//! - [`text`] - custom text keys, weighted pick and templates
//! - [`card`] - card model and the card store contract
//! - [`config`] - configuration management
//! - [`plugin`] - plugin registration and the plugin capability surface
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    DiceBot      │ ← prefixes, contexts, delivery, plugin hooks
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ CommandDispatcher│ ← exact triggers, regex triggers, default roll
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ DiceRollCommand │ ← roll → apply_to_card → output
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ CardStore /     │ ← cards, links, initiative
//! │ TextResolver    │ ← reply texts
//! └─────────────────┘
//! ```

pub mod bot;
pub mod card;
pub mod config;
pub mod dice;
pub mod engine;
pub mod logutil;
pub mod plugin;
pub mod special;
pub mod text;
