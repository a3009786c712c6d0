//! Trigger table: raw command text -> variant.
//!
//! Matching order is fixed: every exact trigger first, then regex triggers in
//! registration order (built-ins are registered before plugins), then the
//! default arithmetic roll. The first enabled match wins.

use log::{debug, trace};
use regex_lite::Regex;
use std::fmt;
use std::sync::Arc;

use super::{DiceRollCommand, Services, SpecialDice};
use crate::bot::context::Context;
use crate::bot::roles::Feature;
use crate::dice::RandomSource;
use crate::logutil::escape_log;
use crate::special::ArithmeticRoll;

/// What a trigger matched. `body` is the argument text with original casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub raw: String,
    pub body: String,
}

pub type VariantFactory = Arc<dyn Fn(&TriggerMatch, &Context) -> Box<dyn SpecialDice> + Send + Sync>;

#[derive(Clone)]
pub enum Trigger {
    /// Literal commands, compared after trimming, lowercasing and collapsing whitespace.
    Exact(Vec<String>),
    /// Case-insensitive pattern; an optional `body` group becomes the arguments.
    Regex(Regex),
}

impl Trigger {
    pub fn exact<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Trigger::Exact(words.into_iter().map(|w| normalize(w.as_ref())).collect())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Trigger::Regex(Regex::new(&format!("(?i){}", pattern))?))
    }

    fn is_exact(&self) -> bool {
        matches!(self, Trigger::Exact(_))
    }

    fn try_match(&self, raw: &str, normalized: &str) -> Option<TriggerMatch> {
        match self {
            Trigger::Exact(words) => words.iter().any(|w| w == normalized).then(|| TriggerMatch {
                raw: raw.to_string(),
                body: String::new(),
            }),
            Trigger::Regex(re) => re.captures(raw).map(|caps| TriggerMatch {
                raw: raw.to_string(),
                body: caps
                    .name("body")
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            }),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Exact(words) => f.debug_tuple("Exact").field(words).finish(),
            Trigger::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
        }
    }
}

/// One row of the trigger table.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub trigger: Trigger,
    /// Disabled features are skipped during matching.
    pub feature: Option<Feature>,
    pub factory: VariantFactory,
}

impl CommandSpec {
    pub fn new<F>(name: impl Into<String>, trigger: Trigger, feature: Option<Feature>, factory: F) -> Self
    where
        F: Fn(&TriggerMatch, &Context) -> Box<dyn SpecialDice> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            feature,
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("feature", &self.feature)
            .finish()
    }
}

/// Trim, lowercase, collapse runs of whitespace.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub struct CommandDispatcher {
    commands: Vec<CommandSpec>,
    services: Services,
}

impl CommandDispatcher {
    /// Empty table; only the default roll answers.
    pub fn new(services: Services) -> Self {
        Self {
            commands: Vec::new(),
            services,
        }
    }

    /// Table with every built-in command.
    pub fn with_builtins(services: Services) -> Self {
        let mut dispatcher = Self::new(services);
        for spec in crate::special::builtin_commands() {
            dispatcher.register(spec);
        }
        dispatcher
    }

    pub fn register(&mut self, spec: CommandSpec) {
        trace!("register command {} {:?}", spec.name, spec.trigger);
        self.commands.push(spec);
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Pick the variant for `raw`. Never fails.
    pub fn select(&self, raw: &str, ctx: &Context) -> (String, Box<dyn SpecialDice>) {
        let trimmed = raw.trim();
        let normalized = normalize(trimmed);
        let exact = self.commands.iter().filter(|c| c.trigger.is_exact());
        let regex = self.commands.iter().filter(|c| !c.trigger.is_exact());
        for spec in exact.chain(regex) {
            let Some(m) = spec.trigger.try_match(trimmed, &normalized) else {
                continue;
            };
            if let Some(feature) = &spec.feature {
                if !ctx.config.feature_enabled(feature) {
                    trace!("{} matched but {} is disabled here", spec.name, feature);
                    continue;
                }
            }
            debug!("dispatch '{}' -> {}", escape_log(trimmed), spec.name);
            return (spec.name.clone(), (spec.factory)(&m, ctx));
        }
        debug!("dispatch '{}' -> default roll", escape_log(trimmed));
        ("roll".to_string(), Box::new(ArithmeticRoll::new(trimmed, false)))
    }

    pub fn dispatch(&self, raw: &str, ctx: Arc<Context>, random: Box<dyn RandomSource>) -> DiceRollCommand {
        let (_, dice) = self.select(raw, &ctx);
        DiceRollCommand::new(raw.trim(), ctx, self.services.clone(), dice, random)
    }
}
