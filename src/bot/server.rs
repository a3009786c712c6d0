use anyhow::Result;
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::context::{Context, IncomingMessage};
use super::outbox::{Outbox, RecordingOutbox};
use super::public::{CommandParser, ParsedMessage};
use super::roles::{role_name, LEVEL_MANAGER, LEVEL_MEMBER, LEVEL_OWNER};
use crate::card::{CardStore, InitiativeStore, MemoryCardStore};
use crate::config::{ChannelSettings, Config};
use crate::dice::{RandomSource, RngSource};
use crate::engine::{CommandDispatcher, DiceRollCommand, EngineError, Services};
use crate::logutil::escape_log;
use crate::plugin::{CustomReply, Plugin, PluginContext, PluginRegistry, WatcherEntry};

/// Produces a fresh random source for every command.
pub type RandomFactory = Arc<dyn Fn() -> Box<dyn RandomSource> + Send + Sync>;

fn entropy_factory() -> RandomFactory {
    Arc::new(|| Box::new(RngSource::from_entropy()) as Box<dyn RandomSource>)
}

/// What one handled message produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Name of the matched trigger row (`roll` for the default), or
    /// `reply:<plugin>` for a plugin custom reply.
    pub command: String,
    pub public: String,
    /// Sent to the invoker only.
    pub private: Option<String>,
    /// Cards changed by the command.
    pub mutated: Vec<String>,
}

/// # DiceBot - message front door
///
/// Owns the trigger table, the store, the outbox and the plugin hooks, and
/// turns chat messages into replies:
///
/// ```text
/// IncomingMessage ─► prefix? ─yes─► Context ─► dispatch ─► roll ─► apply ─► output ─► Outbox
///                       │
///                       └─no──► plugin custom replies ─► Outbox
/// ```
///
/// `DiceBot` is `Send + Sync`; share it behind an `Arc` between tasks. Each
/// command gets its own random source from the configured factory.
pub struct DiceBot {
    config: Config,
    parser: CommandParser,
    dispatcher: CommandDispatcher,
    outbox: Arc<dyn Outbox>,
    random: RandomFactory,
    default_settings: Arc<ChannelSettings>,
    channels: HashMap<String, Arc<ChannelSettings>>,
    replies: Vec<CustomReply>,
    watchers: Vec<WatcherEntry>,
    plugins: Vec<String>,
}

pub struct DiceBotBuilder {
    config: Config,
    stores: Option<(Arc<dyn CardStore>, Arc<dyn InitiativeStore>)>,
    outbox: Option<Arc<dyn Outbox>>,
    random: Option<RandomFactory>,
    registry: PluginRegistry,
}

impl DiceBotBuilder {
    /// Use `store` for cards, links and initiative. Defaults to an in-memory store.
    pub fn store<S>(mut self, store: Arc<S>) -> Self
    where
        S: CardStore + InitiativeStore + 'static,
    {
        self.stores = Some((store.clone(), store));
        self
    }

    /// Defaults to a [`RecordingOutbox`].
    pub fn outbox(mut self, outbox: Arc<dyn Outbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn random<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn RandomSource> + Send + Sync + 'static,
    {
        self.random = Some(Arc::new(factory));
        self
    }

    /// Deterministic randomness: the n-th command uses seed `seed + n`.
    pub fn seeded(self, seed: u64) -> Self {
        let counter = AtomicU64::new(seed);
        self.random(move || {
            Box::new(RngSource::seeded(counter.fetch_add(1, Ordering::Relaxed))) as Box<dyn RandomSource>
        })
    }

    pub fn plugin(mut self, plugin: &dyn Plugin) -> Self {
        self.registry.install(plugin);
        self
    }

    pub fn build(self) -> DiceBot {
        let parts = self.registry.into_parts();
        let texts = Arc::new(parts.texts);
        let (cards, initiative) = self.stores.unwrap_or_else(|| {
            let store = Arc::new(MemoryCardStore::new());
            (store.clone() as Arc<dyn CardStore>, store as Arc<dyn InitiativeStore>)
        });
        let services = Services::new(cards, initiative, texts.clone());

        let mut dispatcher = CommandDispatcher::with_builtins(services);
        for spec in parts.commands {
            dispatcher.register(spec);
        }

        let default_settings = Arc::new(self.config.channel_settings(""));
        let channels: HashMap<String, Arc<ChannelSettings>> = self
            .config
            .channels
            .keys()
            .map(|id| (id.clone(), Arc::new(self.config.channel_settings(id))))
            .collect();
        for (id, settings) in std::iter::once(("[defaults]", &default_settings))
            .chain(channels.iter().map(|(k, v)| (k.as_str(), v)))
        {
            for key in settings.texts.keys() {
                if !texts.knows(key) {
                    warn!("channel {}: text '{}' has no default; only this channel can render it", id, key);
                }
            }
        }

        let parser = if self.config.bot.command_prefixes.is_empty() {
            CommandParser::default()
        } else {
            CommandParser::new(self.config.bot.command_prefixes.iter().cloned())
        };

        info!(
            "{} ready: {} commands, {} plugins, {} configured channels",
            self.config.bot.name,
            dispatcher.commands().len(),
            parts.plugins.len(),
            channels.len()
        );

        DiceBot {
            config: self.config,
            parser,
            dispatcher,
            outbox: self
                .outbox
                .unwrap_or_else(|| Arc::new(RecordingOutbox::new()) as Arc<dyn Outbox>),
            random: self.random.unwrap_or_else(entropy_factory),
            default_settings,
            channels,
            replies: parts.replies,
            watchers: parts.watchers,
            plugins: parts.plugins,
        }
    }
}

impl DiceBot {
    pub fn builder(config: Config) -> DiceBotBuilder {
        DiceBotBuilder {
            config,
            stores: None,
            outbox: None,
            random: None,
            registry: PluginRegistry::new(),
        }
    }

    /// In-memory store, recording outbox, entropy-seeded dice, no plugins.
    pub fn new(config: Config) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn services(&self) -> &Services {
        self.dispatcher.services()
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn outbox(&self) -> &dyn Outbox {
        self.outbox.as_ref()
    }

    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }

    pub fn new_random(&self) -> Box<dyn RandomSource> {
        (self.random)()
    }

    pub fn channel_settings(&self, channel_id: &str) -> Arc<ChannelSettings> {
        self.channels
            .get(channel_id)
            .cloned()
            .unwrap_or_else(|| self.default_settings.clone())
    }

    /// Configured role, raised to whatever the platform grants.
    pub fn user_level(&self, user_id: &str, platform_level: Option<u8>) -> u8 {
        let configured = if self.config.bot.owners.iter().any(|o| o == user_id) {
            LEVEL_OWNER
        } else if self.config.bot.managers.iter().any(|m| m == user_id) {
            LEVEL_MANAGER
        } else {
            LEVEL_MEMBER
        };
        configured.max(platform_level.unwrap_or(LEVEL_MEMBER))
    }

    /// Build the invocation context for `msg`, reading the current link from the store.
    pub fn context_for(&self, msg: &IncomingMessage) -> Result<Context, EngineError> {
        let linked_card = self
            .services()
            .cards
            .linked_card(&msg.channel_id, &msg.user_id)?;
        let user_level = self.user_level(&msg.user_id, msg.platform_level);
        trace!(
            "context {}/{} level {} ({}) linked {:?}",
            msg.channel_id,
            msg.user_id,
            user_level,
            role_name(user_level),
            linked_card
        );
        Ok(Context {
            bot_id: self.config.bot.id.clone(),
            platform: self.config.bot.platform.clone(),
            guild_id: msg.guild_id.clone(),
            channel_id: msg.channel_id.clone(),
            user_id: msg.user_id.clone(),
            user_name: if msg.user_name.is_empty() {
                msg.user_id.clone()
            } else {
                msg.user_name.clone()
            },
            is_direct: msg.is_direct,
            user_level,
            linked_card,
            config: self.channel_settings(&msg.channel_id),
        })
    }

    /// Run one command through the whole lifecycle. Nothing is sent.
    pub fn execute(&self, ctx: Arc<Context>, raw: &str) -> Result<Reply, EngineError> {
        let (command, dice) = self.dispatcher.select(raw, &ctx);
        let mut cmd = DiceRollCommand::new(
            raw.trim(),
            ctx,
            self.services().clone(),
            dice,
            self.new_random(),
        );
        cmd.roll()?;
        let mutated = cmd.apply_to_card()?;
        let public = cmd.output()?.to_string();
        let private = cmd.private_output()?.map(str::to_string);
        Ok(Reply {
            command,
            public,
            private,
            mutated,
        })
    }

    /// Handle one chat message: commands run and are delivered through the
    /// outbox, other text goes to plugin custom replies. `Ok(None)` means the
    /// bot stays silent.
    pub fn handle_message(&self, msg: IncomingMessage) -> Result<Option<Reply>> {
        let body = match self.parser.parse(&msg.text) {
            ParsedMessage::Command(body) => body,
            ParsedMessage::Empty => return Ok(None),
            ParsedMessage::Chat => return self.custom_reply(&msg),
        };

        let ctx = Arc::new(self.context_for(&msg).map_err(|e| {
            error!("Context for {}/{} failed: {}", msg.channel_id, msg.user_id, e);
            e
        })?);
        let reply = match self.execute(ctx.clone(), &body) {
            Ok(reply) => reply,
            Err(e) => {
                error!("Command '{}' from {} failed: {}", escape_log(&body), msg.user_id, e);
                return Err(e.into());
            }
        };
        debug!(
            "{} in {} by {}: {}",
            reply.command,
            msg.channel_id,
            msg.user_id,
            escape_log(&reply.public)
        );

        if !reply.public.is_empty() {
            self.outbox.send_to_channel(&msg.channel_id, &reply.public)?;
        }
        if let Some(private) = reply.private.as_deref().filter(|p| !p.is_empty()) {
            self.outbox.send_to_user(&msg.user_id, private)?;
        }
        if !reply.mutated.is_empty() {
            self.notify_watchers(ctx, &reply.mutated);
        }
        Ok(Some(reply))
    }

    fn custom_reply(&self, msg: &IncomingMessage) -> Result<Option<Reply>> {
        let mut cached: Option<Arc<Context>> = None;
        for reply in &self.replies {
            let Some(matched) = reply.try_match(&msg.text) else {
                continue;
            };
            let ctx = match cached.clone() {
                Some(c) => c,
                None => {
                    let c = Arc::new(self.context_for(msg)?);
                    cached = Some(c.clone());
                    c
                }
            };
            let mut pctx = PluginContext::new(self, ctx, &reply.plugin);
            let Some(text) = (reply.handler)(&mut pctx, &matched)? else {
                continue;
            };
            trace!("plugin {} replies to '{}'", reply.plugin, escape_log(&msg.text));
            if !text.is_empty() {
                self.outbox.send_to_channel(&msg.channel_id, &text)?;
            }
            return Ok(Some(Reply {
                command: format!("reply:{}", reply.plugin),
                public: text,
                ..Default::default()
            }));
        }
        Ok(None)
    }

    fn notify_watchers(&self, ctx: Arc<Context>, mutated: &[String]) {
        for watcher in &self.watchers {
            let mut pctx = PluginContext::new(self, ctx.clone(), &watcher.plugin);
            if let Err(e) = (watcher.handler)(&mut pctx, mutated) {
                warn!("plugin {} card watcher failed: {}", watcher.plugin, e);
            }
        }
    }
}
