//! # Engine Module
//!
//! The command lifecycle. Every command, built-in or plugin, is a [`SpecialDice`]
//! variant wrapped in a [`DiceRollCommand`] that enforces the three phases:
//!
//! ```text
//! dispatch ──► roll() ──► apply_to_card() ──► output()
//!              draws       mutates store      renders text
//!              randomness  (permission-gated) (memoized)
//! ```
//!
//! Each phase runs at most once and only in that order; anything else is an
//! [`EngineError::Lifecycle`].

pub mod dispatch;
pub mod error;

pub use dispatch::{CommandDispatcher, CommandSpec, Trigger, TriggerMatch, VariantFactory};
pub use error::EngineError;

use log::{debug, info};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::bot::context::Context;
use crate::bot::roles::{has_permission, Feature};
use crate::card::{Card, CardStore, InitiativeStore};
use crate::dice::RandomSource;
use crate::logutil::escape_log;
use crate::text::{CustomTextKey, TextResolver};

/// Shared collaborators handed to every command.
#[derive(Clone)]
pub struct Services {
    pub cards: Arc<dyn CardStore>,
    pub initiative: Arc<dyn InitiativeStore>,
    pub texts: Arc<TextResolver>,
}

impl Services {
    pub fn new(cards: Arc<dyn CardStore>, initiative: Arc<dyn InitiativeStore>, texts: Arc<TextResolver>) -> Self {
        Self {
            cards,
            initiative,
            texts,
        }
    }

    /// One store serving both contracts.
    pub fn from_store<S>(store: Arc<S>, texts: Arc<TextResolver>) -> Self
    where
        S: CardStore + InitiativeStore + 'static,
    {
        Self {
            cards: store.clone(),
            initiative: store,
            texts,
        }
    }

    /// The invoker's linked card, read fresh from the store.
    pub fn linked_card(&self, ctx: &Context) -> Result<Option<Card>, EngineError> {
        match self.cards.linked_card(&ctx.channel_id, &ctx.user_id)? {
            Some(name) => Ok(self.cards.get_card(&name)?),
            None => Ok(None),
        }
    }
}

/// Handed to [`SpecialDice::roll`].
pub struct RollContext<'a> {
    pub ctx: &'a Context,
    pub services: &'a Services,
    pub random: &'a mut dyn RandomSource,
}

/// Handed to [`SpecialDice::apply_to_card`]. No randomness: everything random
/// was decided in `roll`.
pub struct ApplyContext<'a> {
    pub ctx: &'a Context,
    pub services: &'a Services,
}

/// Handed to [`SpecialDice::render`].
pub struct RenderContext<'a> {
    pub ctx: &'a Context,
    pub services: &'a Services,
    pub random: &'a mut dyn RandomSource,
}

/// Variables every text can use.
pub fn common_env(ctx: &Context) -> Map<String, Value> {
    let mut env = Map::new();
    env.insert("botId".into(), ctx.bot_id.clone().into());
    env.insert("platform".into(), ctx.platform.clone().into());
    env.insert("channelId".into(), ctx.channel_id.clone().into());
    env.insert("userId".into(), ctx.user_id.clone().into());
    env.insert("userName".into(), ctx.user_name.clone().into());
    env.insert("cardName".into(), ctx.linked_card.clone().unwrap_or_default().into());
    env
}

impl RenderContext<'_> {
    pub fn common_env(&self) -> Map<String, Value> {
        common_env(self.ctx)
    }

    /// Resolve `key` with the common variables overlaid by `vars` (an object).
    pub fn text(&mut self, key: &str, vars: Value) -> Result<String, EngineError> {
        let mut env = self.common_env();
        if let Value::Object(extra) = vars {
            env.extend(extra);
        }
        self.services
            .texts
            .resolve(key, &Value::Object(env), &self.ctx.config.texts, self.random)
    }

    pub fn builtin(&mut self, key: CustomTextKey, vars: Value) -> Result<String, EngineError> {
        self.text(key.as_str(), vars)
    }
}

/// Final text of a command. `private` goes to the invoker only (hidden rolls).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub public: String,
    pub private: Option<String>,
}

impl Rendered {
    pub fn public(text: String) -> Self {
        Self {
            public: text,
            private: None,
        }
    }
}

/// One command variant.
pub trait SpecialDice: Send {
    /// Feature whose write policy gates this variant's mutation. `None` never mutates.
    fn feature(&self) -> Option<Feature>;

    /// True for variants that can change the store. Their feature's write
    /// policy is checked before `roll`; a refusal skips the variant entirely
    /// and renders `card.nopermission`.
    fn writes(&self) -> bool {
        false
    }

    /// Parse arguments, read what is needed and draw all randomness.
    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError>;

    /// True when `roll` left something to write. A variant that does not
    /// declare [`writes`](SpecialDice::writes) is checked here instead.
    fn wants_mutation(&self) -> bool {
        false
    }

    /// Write the decided changes. Returns names of cards actually changed.
    fn apply_to_card(&mut self, _ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        Ok(Vec::new())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Constructed,
    Rolled,
    Applied,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Constructed => "constructed",
            Phase::Rolled => "rolled",
            Phase::Applied => "applied",
        }
    }
}

/// Lifecycle wrapper around one [`SpecialDice`] variant.
pub struct DiceRollCommand {
    raw: String,
    context: Arc<Context>,
    services: Services,
    dice: Box<dyn SpecialDice>,
    random: Box<dyn RandomSource>,
    phase: Phase,
    permitted: Option<bool>,
    mutated: Vec<String>,
    output: Option<Rendered>,
}

impl DiceRollCommand {
    pub fn new(
        raw: impl Into<String>,
        context: Arc<Context>,
        services: Services,
        dice: Box<dyn SpecialDice>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            raw: raw.into(),
            context,
            services,
            dice,
            random,
            phase: Phase::Constructed,
            permitted: None,
            mutated: Vec::new(),
            output: None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn feature(&self) -> Option<Feature> {
        self.dice.feature()
    }

    /// `Some(false)` when a pending mutation was refused; `None` before `roll`
    /// or when nothing needed permission.
    pub fn permission(&self) -> Option<bool> {
        self.permitted
    }

    pub fn mutated_cards(&self) -> &[String] {
        &self.mutated
    }

    fn expect_phase(&self, wanted: Phase, action: &'static str) -> Result<(), EngineError> {
        if self.phase == wanted {
            Ok(())
        } else {
            Err(EngineError::Lifecycle {
                phase: action,
                state: self.phase.name(),
            })
        }
    }

    pub fn roll(&mut self) -> Result<&mut Self, EngineError> {
        self.expect_phase(Phase::Constructed, "roll")?;
        if self.dice.writes() && !self.check_permission() {
            self.phase = Phase::Rolled;
            return Ok(self);
        }
        {
            let mut rc = RollContext {
                ctx: &self.context,
                services: &self.services,
                random: self.random.as_mut(),
            };
            self.dice.roll(&mut rc)?;
        }
        if self.permitted.is_none() && self.dice.wants_mutation() {
            self.check_permission();
        }
        self.phase = Phase::Rolled;
        Ok(self)
    }

    /// Evaluate the feature's write policy once and record the decision.
    fn check_permission(&mut self) -> bool {
        let policy = self
            .dice
            .feature()
            .map(|f| self.context.config.write_policy(&f));
        let allowed = policy.map(|p| has_permission(p, &self.context)).unwrap_or(true);
        if !allowed {
            debug!(
                "permission denied for '{}' by {} ({:?})",
                escape_log(&self.raw),
                escape_log(&self.context.user_id),
                policy
            );
        }
        self.permitted = Some(allowed);
        allowed
    }

    pub fn apply_to_card(&mut self) -> Result<Vec<String>, EngineError> {
        self.expect_phase(Phase::Rolled, "apply")?;
        self.phase = Phase::Applied;
        if self.permitted != Some(true) || !self.dice.wants_mutation() {
            return Ok(Vec::new());
        }
        let ac = ApplyContext {
            ctx: &self.context,
            services: &self.services,
        };
        let mutated = self.dice.apply_to_card(&ac)?;
        if !mutated.is_empty() {
            info!(
                "'{}' by {} changed {:?}",
                escape_log(&self.raw),
                escape_log(&self.context.user_id),
                mutated
            );
        }
        self.mutated = mutated.clone();
        Ok(mutated)
    }

    fn rendered(&mut self) -> Result<&Rendered, EngineError> {
        self.expect_phase(Phase::Applied, "render")?;
        let rendered = match self.output.take() {
            Some(done) => done,
            None => {
                let mut rc = RenderContext {
                    ctx: &self.context,
                    services: &self.services,
                    random: self.random.as_mut(),
                };
                if self.permitted == Some(false) {
                    Rendered::public(rc.builtin(CustomTextKey::CardNoPermission, Value::Null)?)
                } else {
                    self.dice.render(&mut rc)?
                }
            }
        };
        let stored: &Rendered = self.output.insert(rendered);
        Ok(stored)
    }

    /// Player-facing text. Computed once; later calls return the same string.
    pub fn output(&mut self) -> Result<&str, EngineError> {
        Ok(self.rendered()?.public.as_str())
    }

    /// Text meant only for the invoker, if any.
    pub fn private_output(&mut self) -> Result<Option<&str>, EngineError> {
        Ok(self.rendered()?.private.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardQuery, CardType, InitiativeEntry, MemoryCardStore, StoreError};
    use crate::dice::ScriptedSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts every call made through either contract.
    struct CountingStore {
        inner: MemoryCardStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CardStore for CountingStore {
        fn query_card(&self, query: &CardQuery) -> Result<Vec<Card>, StoreError> {
            self.tick();
            self.inner.query_card(query)
        }
        fn get_card(&self, name: &str) -> Result<Option<Card>, StoreError> {
            self.tick();
            self.inner.get_card(name)
        }
        fn save_card(&self, card: Card) -> Result<(), StoreError> {
            self.tick();
            self.inner.save_card(card)
        }
        fn link_card(&self, name: Option<&str>, channel_id: &str, user_id: &str) -> Result<(), StoreError> {
            self.tick();
            self.inner.link_card(name, channel_id, user_id)
        }
        fn linked_card(&self, channel_id: &str, user_id: &str) -> Result<Option<String>, StoreError> {
            self.tick();
            self.inner.linked_card(channel_id, user_id)
        }
        fn update_card(&self, name: &str, f: &mut dyn FnMut(&mut Card)) -> Result<Card, StoreError> {
            self.tick();
            self.inner.update_card(name, f)
        }
    }

    impl InitiativeStore for CountingStore {
        fn initiative_list(&self, channel_id: &str) -> Result<Vec<InitiativeEntry>, StoreError> {
            self.tick();
            self.inner.initiative_list(channel_id)
        }
        fn set_initiative(&self, channel_id: &str, entry: InitiativeEntry) -> Result<Vec<InitiativeEntry>, StoreError> {
            self.tick();
            self.inner.set_initiative(channel_id, entry)
        }
        fn clear_initiative(&self, channel_id: &str) -> Result<(), StoreError> {
            self.tick();
            self.inner.clear_initiative(channel_id)
        }
    }

    /// Reads Alice in every phase; `writes` declares it a writing variant.
    struct Reader {
        writes: bool,
        rolled: Arc<AtomicUsize>,
    }

    impl SpecialDice for Reader {
        fn feature(&self) -> Option<Feature> {
            Some(Feature::St)
        }
        fn writes(&self) -> bool {
            self.writes
        }
        fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
            self.rolled.fetch_add(1, Ordering::SeqCst);
            rc.services.cards.get_card("Alice")?;
            Ok(())
        }
        fn wants_mutation(&self) -> bool {
            true
        }
        fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
            let card = ac.services.cards.update_card("Alice", &mut |c: &mut Card| c.set_entry("hp", 1, false))?;
            Ok(vec![card.name])
        }
        fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
            let hp = rc
                .services
                .cards
                .get_card("Alice")?
                .and_then(|c| c.value("hp"))
                .unwrap_or_default();
            Ok(Rendered::public(format!("hp {}", hp)))
        }
    }

    struct Fixture {
        cmd: DiceRollCommand,
        store: Arc<CountingStore>,
        rolled: Arc<AtomicUsize>,
    }

    fn fixture(ctx: Context, writes: bool) -> Fixture {
        let store = Arc::new(CountingStore {
            inner: MemoryCardStore::new().with_cards([Card::new("Alice", CardType::Coc).with_entry("hp", 9)]),
            calls: AtomicUsize::new(0),
        });
        let rolled = Arc::new(AtomicUsize::new(0));
        let cmd = DiceRollCommand::new(
            "test",
            Arc::new(ctx),
            Services::from_store(store.clone(), Arc::new(TextResolver::new())),
            Box::new(Reader {
                writes,
                rolled: rolled.clone(),
            }),
            Box::new(ScriptedSource::new()),
        );
        Fixture { cmd, store, rolled }
    }

    fn st_policy(writable: crate::bot::roles::WritePolicy) -> Context {
        let mut settings = crate::config::ChannelSettings::default();
        settings.features.insert(
            "st".into(),
            crate::config::FeatureSettings {
                enabled: true,
                writable,
            },
        );
        Context::new("c", "u").with_config(settings)
    }

    #[test]
    fn repeated_output_makes_no_store_calls() {
        let mut f = fixture(Context::new("c", "u"), true);
        f.cmd.roll().unwrap();
        assert_eq!(f.cmd.apply_to_card().unwrap(), vec!["Alice".to_string()]);
        assert_eq!(f.cmd.output().unwrap(), "hp 1");
        let after_first = f.store.calls();
        assert_eq!(f.cmd.output().unwrap(), "hp 1");
        assert_eq!(f.cmd.private_output().unwrap(), None);
        assert_eq!(f.store.calls(), after_first);
    }

    #[test]
    fn phases_must_run_in_order() {
        let mut f = fixture(Context::new("c", "u"), false);
        assert!(matches!(f.cmd.output(), Err(EngineError::Lifecycle { .. })));
        assert!(matches!(f.cmd.apply_to_card(), Err(EngineError::Lifecycle { .. })));
        f.cmd.roll().unwrap();
        assert!(matches!(f.cmd.roll(), Err(EngineError::Lifecycle { phase: "roll", .. })));
        f.cmd.apply_to_card().unwrap();
        assert!(matches!(f.cmd.apply_to_card(), Err(EngineError::Lifecycle { .. })));
        assert!(f.cmd.output().is_ok());
    }

    #[test]
    fn refused_writer_never_rolls() {
        let mut f = fixture(st_policy(crate::bot::roles::WritePolicy::None), true);
        f.cmd.roll().unwrap();
        assert_eq!(f.cmd.permission(), Some(false));
        assert_eq!(f.rolled.load(Ordering::SeqCst), 0);
        assert!(f.cmd.apply_to_card().unwrap().is_empty());
        assert_eq!(f.cmd.output().unwrap(), "u is not allowed to change cards here.");
        assert_eq!(f.store.calls(), 0);
    }

    #[test]
    fn undeclared_writer_is_checked_after_roll() {
        let mut f = fixture(st_policy(crate::bot::roles::WritePolicy::None), false);
        f.cmd.roll().unwrap();
        assert_eq!(f.rolled.load(Ordering::SeqCst), 1);
        assert_eq!(f.cmd.permission(), Some(false));
        assert!(f.cmd.apply_to_card().unwrap().is_empty());
        assert_eq!(f.cmd.output().unwrap(), "u is not allowed to change cards here.");
        assert_eq!(f.store.inner.get_card("Alice").unwrap().unwrap().value("hp"), Some(9));
    }
}
