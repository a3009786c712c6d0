//! Test utilities & fixtures.
//! Cards, stores, contexts and bots shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rolldeck::bot::{Context, DiceBot, IncomingMessage, RecordingOutbox, Reply};
use rolldeck::card::{Card, CardType, MemoryCardStore};
use rolldeck::config::{ChannelSettings, Config};
use rolldeck::dice::{RandomSource, ScriptedSource};
use rolldeck::engine::{CommandDispatcher, Services};
use rolldeck::text::TextResolver;

/// Alice and Alicia (CoC), Bob (D&D, down at 0 hp), and a CoC template.
pub fn sample_cards() -> Vec<Card> {
    let alice = Card::new("Alice", CardType::Coc)
        .with_entry("sanity", 60)
        .with_entry("hp", 11)
        .with_entry("spot", 45)
        .with_entry("library", 50);
    let alicia = Card::new("Alicia", CardType::Coc)
        .with_entry("sanity", 40)
        .with_entry("spot", 30);
    let bob = Card::new("Bob", CardType::Dnd)
        .with_entry("hp", 0)
        .with_entry("dex", 14);
    let mut template = Card::new("Alien Investigator", CardType::Coc).with_entry("sanity", 50);
    template.is_template = true;
    vec![alice, alicia, bob, template]
}

pub fn store() -> Arc<MemoryCardStore> {
    Arc::new(MemoryCardStore::new().with_cards(sample_cards()))
}

pub fn services(store: Arc<MemoryCardStore>) -> Services {
    Services::from_store(store, Arc::new(TextResolver::new()))
}

pub fn dispatcher(store: Arc<MemoryCardStore>) -> CommandDispatcher {
    CommandDispatcher::with_builtins(services(store))
}

/// Member `user` named `name` in `channel`, default channel settings.
pub fn context(channel: &str, user: &str, name: &str) -> Context {
    Context::new(channel, user).with_user_name(name)
}

pub fn context_with(channel: &str, user: &str, name: &str, settings: ChannelSettings) -> Context {
    context(channel, user, name).with_config(settings)
}

/// Run `raw` through the full lifecycle with scripted dice; returns the
/// public text and the mutated card names.
pub fn run(dispatcher: &CommandDispatcher, ctx: Context, raw: &str, dice: &[u32]) -> (String, Vec<String>) {
    let random = ScriptedSource::new().with_dice(dice.iter().copied());
    let mut cmd = dispatcher.dispatch(raw, Arc::new(ctx), Box::new(random));
    cmd.roll().expect("roll");
    let mutated = cmd.apply_to_card().expect("apply");
    let text = cmd.output().expect("output").to_string();
    (text, mutated)
}

/// Dice shared between the test and every command a bot runs.
#[derive(Clone, Default)]
pub struct SharedDice(Arc<Mutex<VecDeque<u32>>>);

impl SharedDice {
    pub fn push(&self, values: &[u32]) {
        self.0.lock().unwrap().extend(values.iter().copied());
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn remaining(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

impl RandomSource for SharedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.0.lock().unwrap().pop_front().unwrap_or(1).clamp(1, sides)
    }

    fn unit(&mut self) -> f64 {
        0.0
    }
}

pub struct TestBot {
    pub bot: DiceBot,
    pub store: Arc<MemoryCardStore>,
    pub outbox: Arc<RecordingOutbox>,
    pub dice: SharedDice,
}

impl TestBot {
    pub fn say(&self, user: &str, text: &str, dice: &[u32]) -> Option<Reply> {
        self.dice.push(dice);
        self.bot
            .handle_message(IncomingMessage::new("table", user, text).from_user(display_name(user)))
            .expect("handle_message")
    }
}

fn display_name(user: &str) -> String {
    match user {
        "u1" => "Kim".to_string(),
        "u2" => "Lee".to_string(),
        other => other.to_string(),
    }
}

pub fn test_bot(config: Config) -> TestBot {
    test_bot_with(config, |b| b)
}

/// Build a bot over the sample store; `extra` can add plugins.
pub fn test_bot_with<F>(config: Config, extra: F) -> TestBot
where
    F: FnOnce(rolldeck::bot::DiceBotBuilder) -> rolldeck::bot::DiceBotBuilder,
{
    let store = store();
    let outbox = Arc::new(RecordingOutbox::new());
    let dice = SharedDice::default();
    let shared = dice.clone();
    let builder = DiceBot::builder(config)
        .store(store.clone())
        .outbox(outbox.clone())
        .random(move || Box::new(shared.clone()) as Box<dyn RandomSource>);
    TestBot {
        bot: extra(builder).build(),
        store,
        outbox,
        dice,
    }
}
