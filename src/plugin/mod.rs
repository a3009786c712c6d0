//! # Plugin Module
//!
//! Plugins extend the bot at startup through a [`PluginRegistry`]:
//!
//! - default texts and text handlers for their own keys (or to override built-ins)
//! - new commands, matched after every built-in trigger of the same kind
//! - custom replies: a regex over plain chat (non-command) messages
//! - card watchers, told which cards a command changed
//!
//! At run time plugins only see a [`PluginContext`], which exposes a fixed set
//! of capabilities instead of the bot itself.
//!
//! ```rust,no_run
//! use rolldeck::plugin::{Plugin, PluginRegistry};
//! use rolldeck::text::CustomTextItem;
//!
//! struct Greeter;
//!
//! impl Plugin for Greeter {
//!     fn id(&self) -> &str { "greeter" }
//!     fn register(&self, registry: &mut PluginRegistry) {
//!         registry.register_text("greeter.hello", vec![CustomTextItem::new(1.0, "Hi {{userName}}!")]);
//!         let _ = registry.register_custom_reply(r"^(hi|hello)\b", |ctx, _m| {
//!             Ok(Some(ctx.text("greeter.hello", serde_json::json!({}))?))
//!         });
//!     }
//! }
//! ```

use log::{debug, info};
use regex_lite::Regex;
use serde_json::Value;
use std::sync::Arc;

use crate::bot::context::Context;
use crate::bot::server::{DiceBot, Reply};
use crate::card::{Card, CardQuery};
use crate::config::ChannelSettings;
use crate::dice::{DiceError, DiceExpression, RollOutcome};
use crate::engine::{common_env, CommandSpec, EngineError};
use crate::text::{CustomTextItem, TextResolver};

pub trait Plugin: Send + Sync {
    /// Stable id; also the name of the `[plugins.<id>]` config table.
    fn id(&self) -> &str;
    fn register(&self, registry: &mut PluginRegistry);
}

/// A matched custom reply. `groups[0]` is the whole match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMatch {
    pub text: String,
    pub groups: Vec<Option<String>>,
}

pub type ReplyHandler =
    Arc<dyn Fn(&mut PluginContext<'_>, &ReplyMatch) -> anyhow::Result<Option<String>> + Send + Sync>;
pub type CardWatcher = Arc<dyn Fn(&mut PluginContext<'_>, &[String]) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct CustomReply {
    pub plugin: String,
    pub pattern: Regex,
    pub handler: ReplyHandler,
}

impl CustomReply {
    pub fn try_match(&self, text: &str) -> Option<ReplyMatch> {
        self.pattern.captures(text).map(|caps| ReplyMatch {
            text: text.to_string(),
            groups: caps
                .iter()
                .map(|g| g.map(|m| m.as_str().to_string()))
                .collect(),
        })
    }
}

#[derive(Clone)]
pub struct WatcherEntry {
    pub plugin: String,
    pub handler: CardWatcher,
}

/// Everything plugins registered, consumed by the bot builder.
pub struct PluginRegistry {
    current: String,
    plugins: Vec<String>,
    texts: TextResolver,
    commands: Vec<CommandSpec>,
    replies: Vec<CustomReply>,
    watchers: Vec<WatcherEntry>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            current: String::new(),
            plugins: Vec::new(),
            texts: TextResolver::new(),
            commands: Vec::new(),
            replies: Vec::new(),
            watchers: Vec::new(),
        }
    }

    /// Let `plugin` register everything it provides.
    pub fn install(&mut self, plugin: &dyn Plugin) {
        self.current = plugin.id().to_string();
        plugin.register(self);
        info!("Plugin {} registered", self.current);
        self.plugins.push(std::mem::take(&mut self.current));
    }

    /// Id of the plugin currently registering (empty outside [`install`](Self::install)).
    pub fn plugin_id(&self) -> &str {
        &self.current
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn register_text(&mut self, key: impl Into<String>, items: Vec<CustomTextItem>) {
        self.texts.register_default(key, items);
    }

    pub fn register_text_handler<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.texts.register_handler(key, Arc::new(handler));
    }

    pub fn register_command(&mut self, spec: CommandSpec) {
        debug!("plugin {} adds command {}", self.current, spec.name);
        self.commands.push(spec);
    }

    /// `pattern` is matched case-insensitively against plain chat messages.
    pub fn register_custom_reply<F>(&mut self, pattern: &str, handler: F) -> Result<(), regex_lite::Error>
    where
        F: Fn(&mut PluginContext<'_>, &ReplyMatch) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        let pattern = Regex::new(&format!("(?i){}", pattern))?;
        self.replies.push(CustomReply {
            plugin: self.current.clone(),
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn on_card_changed<F>(&mut self, handler: F)
    where
        F: Fn(&mut PluginContext<'_>, &[String]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.watchers.push(WatcherEntry {
            plugin: self.current.clone(),
            handler: Arc::new(handler),
        });
    }

    pub(crate) fn into_parts(self) -> RegistryParts {
        RegistryParts {
            plugins: self.plugins,
            texts: self.texts,
            commands: self.commands,
            replies: self.replies,
            watchers: self.watchers,
        }
    }
}

pub(crate) struct RegistryParts {
    pub plugins: Vec<String>,
    pub texts: TextResolver,
    pub commands: Vec<CommandSpec>,
    pub replies: Vec<CustomReply>,
    pub watchers: Vec<WatcherEntry>,
}

/// What a plugin may do while handling a reply or watching cards.
pub struct PluginContext<'a> {
    bot: &'a DiceBot,
    ctx: Arc<Context>,
    plugin_id: &'a str,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(bot: &'a DiceBot, ctx: Arc<Context>, plugin_id: &'a str) -> Self {
        Self { bot, ctx, plugin_id }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn plugin_id(&self) -> &str {
        self.plugin_id
    }

    /// Roll an expression with the channel's default die and a fresh random source.
    pub fn roll(&mut self, expression: &str) -> Result<RollOutcome, DiceError> {
        let expression = DiceExpression::parse(expression, self.ctx.config.default_sides)?;
        let mut random = self.bot.new_random();
        expression.roll(random.as_mut())
    }

    pub fn get_card(&self, name: &str) -> anyhow::Result<Option<Card>> {
        Ok(self.bot.services().cards.get_card(name)?)
    }

    pub fn save_card(&self, card: Card) -> anyhow::Result<()> {
        Ok(self.bot.services().cards.save_card(card)?)
    }

    pub fn query_card(&self, query: &CardQuery) -> anyhow::Result<Vec<Card>> {
        Ok(self.bot.services().cards.query_card(query)?)
    }

    /// Link (or with `None` unlink) the invoking user in the current channel.
    pub fn link_card(&self, name: Option<&str>) -> anyhow::Result<()> {
        self.bot
            .services()
            .cards
            .link_card(name, &self.ctx.channel_id, &self.ctx.user_id)?;
        Ok(())
    }

    pub fn send_message_to_channel(&self, text: &str) -> anyhow::Result<()> {
        self.bot.outbox().send_to_channel(&self.ctx.channel_id, text)
    }

    pub fn send_message_to_user(&self, text: &str) -> anyhow::Result<()> {
        self.bot.outbox().send_to_user(&self.ctx.user_id, text)
    }

    pub fn get_config(&self) -> &ChannelSettings {
        &self.ctx.config
    }

    /// A value from this plugin's `[plugins.<id>]` table.
    pub fn get_preference(&self, key: &str) -> Option<toml::Value> {
        self.bot
            .config()
            .plugins
            .get(self.plugin_id)
            .and_then(|table| table.get(key))
            .cloned()
    }

    /// Resolve a text key the same way commands do, with the common variables.
    pub fn text(&mut self, key: &str, vars: Value) -> Result<String, EngineError> {
        let mut env = common_env(&self.ctx);
        if let Value::Object(extra) = vars {
            env.extend(extra);
        }
        let mut random = self.bot.new_random();
        self.bot
            .services()
            .texts
            .resolve(key, &Value::Object(env), &self.ctx.config.texts, random.as_mut())
    }

    /// Run `raw` as if the invoking user had typed it (without a prefix).
    /// The reply is returned, not sent.
    pub fn dispatch_user_command(&self, raw: &str) -> anyhow::Result<Reply> {
        Ok(self.bot.execute(self.ctx.clone(), raw)?)
    }
}
