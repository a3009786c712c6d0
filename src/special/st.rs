//! `st show [keys]` and `st <key><op><value> ...`.
//!
//! Pairs look like `hp10`, `san:60`, `dex=70`, `hp-1d6`, `mp + 2`. A value may
//! be a small dice expression; `+` and `-` adjust the current value, anything
//! else replaces it.

use regex_lite::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::bot::roles::Feature;
use crate::card::{normalize_key, Card};
use crate::dice::DiceExpression;
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<key>[^\d\s+\-=:*/,，]+)\s*(?P<op>[=:+\-])?\s*(?P<value>(?:\d*[dD]\d+|\d+)(?:\s*[+\-*]\s*(?:\d*[dD]\d+|\d+))*)",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatPair {
    pub key: String,
    pub op: StatOp,
    pub expression: String,
}

/// Parse every pair in `input`. Leftover text that is not separators is an error.
pub fn parse_pairs(input: &str) -> Result<Vec<StatPair>, String> {
    let mut pairs = Vec::new();
    let mut leftover = String::new();
    let mut last = 0;
    for caps in PAIR_RE.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        leftover.push_str(&input[last..whole.start()]);
        last = whole.end();
        let op = match caps.name("op").map(|m| m.as_str()) {
            Some("+") => StatOp::Add,
            Some("-") => StatOp::Sub,
            _ => StatOp::Set,
        };
        pairs.push(StatPair {
            key: normalize_key(caps.name("key").map(|m| m.as_str()).unwrap_or_default()),
            op,
            expression: caps
                .name("value")
                .map(|m| m.as_str().split_whitespace().collect::<String>())
                .unwrap_or_default(),
        });
    }
    leftover.push_str(&input[last..]);
    let stray: String = leftover
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '，')
        .collect();
    if !stray.is_empty() {
        return Err(format!("cannot read '{}'", stray));
    }
    if pairs.is_empty() {
        return Err("no key/value pairs".to_string());
    }
    Ok(pairs)
}

/// `st show [keys]`
#[derive(Debug, Clone)]
pub struct StatShow {
    keys: Vec<String>,
    card: Option<Card>,
}

impl StatShow {
    pub fn new(args: &str) -> Self {
        Self {
            keys: args
                .split(|c: char| c.is_whitespace() || c == ',' || c == '，')
                .filter(|s| !s.is_empty())
                .map(normalize_key)
                .collect(),
            card: None,
        }
    }
}

impl SpecialDice for StatShow {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::St)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.card = rc.services.linked_card(rc.ctx)?;
        Ok(())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let Some(card) = &self.card else {
            return Ok(Rendered::public(rc.builtin(CustomTextKey::CardEmpty, json!({}))?));
        };
        let entries: Vec<Value> = if self.keys.is_empty() {
            card.visible_entries()
                .map(|(k, v)| json!({"key": k, "value": v}))
                .collect()
        } else {
            self.keys
                .iter()
                .filter_map(|k| card.value(k).map(|v| json!({"key": k, "value": v})))
                .collect()
        };
        Ok(Rendered::public(rc.builtin(
            CustomTextKey::StShow,
            json!({"cardName": card.name, "entries": entries}),
        )?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Change {
    key: String,
    op: StatOp,
    amount: i64,
    before: i64,
    after: i64,
}

#[derive(Debug, Clone)]
enum State {
    Pending,
    NoCard,
    Invalid(String),
    Ready { card: String, changes: Vec<Change> },
}

/// `st <pairs>`
#[derive(Debug, Clone)]
pub struct StatSet {
    args: String,
    state: State,
}

impl StatSet {
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            state: State::Pending,
        }
    }
}

impl SpecialDice for StatSet {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::St)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let pairs = match parse_pairs(&self.args) {
            Ok(p) => p,
            Err(message) => {
                self.state = State::Invalid(message);
                return Ok(());
            }
        };
        let Some(card) = rc
            .services
            .cards
            .linked_card(&rc.ctx.channel_id, &rc.ctx.user_id)?
        else {
            self.state = State::NoCard;
            return Ok(());
        };
        let sides = rc.ctx.config.default_sides;
        let mut changes = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let rolled = DiceExpression::parse(&pair.expression, sides).and_then(|e| e.roll(rc.random));
            match rolled {
                Ok(outcome) => changes.push(Change {
                    key: pair.key,
                    op: pair.op,
                    amount: outcome.total,
                    before: 0,
                    after: 0,
                }),
                Err(e) => {
                    self.state = State::Invalid(format!("{}: {}", pair.expression, e));
                    return Ok(());
                }
            }
        }
        self.state = State::Ready { card, changes };
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        matches!(self.state, State::Ready { .. })
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let State::Ready { card, changes } = &mut self.state else {
            return Ok(Vec::new());
        };
        ac.services.cards.update_card(card, &mut |c: &mut Card| {
            for change in changes.iter_mut() {
                let before = c.value(&change.key).unwrap_or(0);
                let after = match change.op {
                    StatOp::Set => change.amount,
                    StatOp::Add => before.saturating_add(change.amount),
                    StatOp::Sub => before.saturating_sub(change.amount),
                };
                let is_temp = c.get_entry(&change.key).map(|e| e.is_temp).unwrap_or(false);
                c.set_entry(&change.key, after, is_temp);
                change.before = before;
                change.after = after;
            }
        })?;
        Ok(vec![card.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let text = match &self.state {
            State::Pending => String::new(),
            State::NoCard => rc.builtin(CustomTextKey::CardEmpty, json!({}))?,
            State::Invalid(message) => rc.builtin(
                CustomTextKey::RollError,
                json!({"expression": format!("st {}", self.args), "errorMessage": message}),
            )?,
            State::Ready { card, changes } => {
                let list: Vec<Value> = changes
                    .iter()
                    .map(|c| json!({"key": c.key, "before": c.before, "after": c.after}))
                    .collect();
                rc.builtin(
                    CustomTextKey::StSet,
                    json!({"cardName": card, "changes": list}),
                )?
            }
        };
        Ok(Rendered::public(text))
    }
}
