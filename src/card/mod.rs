//! Character cards and the store contract the engine talks to.
//!
//! The engine only ever sees [`CardStore`] and [`InitiativeStore`]; the shipped
//! [`MemoryCardStore`] keeps everything in memory with optional JSON persistence.

pub mod memory;

pub use memory::MemoryCardStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rule system a card belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    General,
    Coc,
    Dnd,
}

impl CardType {
    pub fn as_str(self) -> &'static str {
        match self {
            CardType::General => "general",
            CardType::Coc => "coc",
            CardType::Dnd => "dnd",
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(CardType::General),
            "coc" => Ok(CardType::Coc),
            "dnd" | "5e" => Ok(CardType::Dnd),
            other => Err(format!("unknown card type '{}'", other)),
        }
    }
}

/// A numeric card entry. Temporary entries hold bookkeeping (growth marks,
/// death save counters) and are hidden from `st show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEntry {
    pub value: i64,
    #[serde(default)]
    pub is_temp: bool,
}

/// Entry key aliases. Left side is what players type (lowercased), right side
/// is the stored key.
const ALIASES: &[(&str, &str)] = &[
    ("san", "sanity"),
    ("sanity", "sanity"),
    ("理智", "sanity"),
    ("hp", "hp"),
    ("生命", "hp"),
    ("体力", "hp"),
    ("mp", "mp"),
    ("魔法", "mp"),
    ("str", "str"),
    ("strength", "str"),
    ("力量", "str"),
    ("dex", "dex"),
    ("dexterity", "dex"),
    ("敏捷", "dex"),
    ("con", "con"),
    ("constitution", "con"),
    ("体质", "con"),
    ("int", "int"),
    ("intelligence", "int"),
    ("智力", "int"),
    ("pow", "pow"),
    ("power", "pow"),
    ("意志", "pow"),
    ("app", "app"),
    ("外貌", "app"),
    ("siz", "siz"),
    ("size", "siz"),
    ("体型", "siz"),
    ("edu", "edu"),
    ("education", "edu"),
    ("教育", "edu"),
    ("luck", "luck"),
    ("幸运", "luck"),
    ("wis", "wis"),
    ("wisdom", "wis"),
    ("cha", "cha"),
    ("charisma", "cha"),
];

/// Normalize an entry or ability key: trim, lowercase, resolve aliases.
pub fn normalize_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    #[serde(rename = "type", default)]
    pub card_type: CardType,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub entries: BTreeMap<String, CardEntry>,
    #[serde(default)]
    pub abilities: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(name: impl Into<String>, card_type: CardType) -> Self {
        Self {
            name: name.into(),
            card_type,
            is_template: false,
            entries: BTreeMap::new(),
            abilities: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Builder helper for fixtures and the CLI.
    pub fn with_entry(mut self, key: &str, value: i64) -> Self {
        self.set_entry(key, value, false);
        self
    }

    pub fn get_entry(&self, key: &str) -> Option<CardEntry> {
        self.entries.get(&normalize_key(key)).copied()
    }

    pub fn value(&self, key: &str) -> Option<i64> {
        self.get_entry(key).map(|e| e.value)
    }

    pub fn set_entry(&mut self, key: &str, value: i64, is_temp: bool) {
        self.entries.insert(normalize_key(key), CardEntry { value, is_temp });
        self.touch();
    }

    pub fn remove_entry(&mut self, key: &str) -> Option<CardEntry> {
        let removed = self.entries.remove(&normalize_key(key));
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn get_ability(&self, key: &str) -> Option<&str> {
        self.abilities.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn set_ability(&mut self, key: &str, expression: impl Into<String>) {
        self.abilities.insert(normalize_key(key), expression.into());
        self.touch();
    }

    /// Non-temporary entries in key order.
    pub fn visible_entries(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.is_temp)
            .map(|(k, e)| (k.as_str(), e.value))
    }

    /// D&D ability modifier for a score entry: floor((score - 10) / 2).
    pub fn ability_modifier(&self, key: &str) -> Option<i64> {
        self.value(key).map(|score| (score - 10).div_euclid(2))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Conjunctive card filter. `name` is a case-insensitive substring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardQuery {
    pub name: Option<String>,
    pub card_type: Option<CardType>,
    pub is_template: Option<bool>,
}

impl CardQuery {
    pub fn matches(&self, card: &Card) -> bool {
        if let Some(name) = &self.name {
            if !card.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(t) = self.card_type {
            if card.card_type != t {
                return false;
            }
        }
        if let Some(tpl) = self.is_template {
            if card.is_template != tpl {
                return false;
            }
        }
        true
    }
}

/// Errors from a card store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Linking or updating a card that does not exist.
    #[error("card not found: {0}")]
    CardNotFound(String),

    /// Wrapper around IO errors (file persistence).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around serde_json errors (file persistence).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of a channel's initiative list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub name: String,
    pub value: i64,
    pub detail: String,
}

/// Card lookup, link and mutation contract.
///
/// Implementations must serialize mutations of a single card: `update_card`
/// runs the closure while holding whatever lock protects that card.
pub trait CardStore: Send + Sync {
    /// All cards matching `query`; empty when nothing matches.
    fn query_card(&self, query: &CardQuery) -> Result<Vec<Card>, StoreError>;

    fn get_card(&self, name: &str) -> Result<Option<Card>, StoreError>;

    /// Insert or replace a card by name.
    fn save_card(&self, card: Card) -> Result<(), StoreError>;

    /// Link `name` for `(channel, user)`, or clear the link with `None`.
    fn link_card(&self, name: Option<&str>, channel_id: &str, user_id: &str) -> Result<(), StoreError>;

    fn linked_card(&self, channel_id: &str, user_id: &str) -> Result<Option<String>, StoreError>;

    /// Mutate one card under its lock and return the updated copy.
    fn update_card(&self, name: &str, f: &mut dyn FnMut(&mut Card)) -> Result<Card, StoreError>;
}

/// Per-channel initiative order used by `ri`.
pub trait InitiativeStore: Send + Sync {
    /// Entries sorted by value, highest first.
    fn initiative_list(&self, channel_id: &str) -> Result<Vec<InitiativeEntry>, StoreError>;

    /// Insert or replace the entry with the same name; returns the new list.
    fn set_initiative(&self, channel_id: &str, entry: InitiativeEntry) -> Result<Vec<InitiativeEntry>, StoreError>;

    fn clear_initiative(&self, channel_id: &str) -> Result<(), StoreError>;
}
