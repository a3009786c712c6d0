//! In-memory card store with optional JSON file persistence.
//!
//! - File layout: `{"cards": {name: Card}, "links": {channel: {user: name}}, "initiative": {channel: [..]}}`
//! - Concurrency: one mutex around the whole state; the file is read under an fs2
//!   shared lock and rewritten under an exclusive lock after every mutation.
//! - Failure: a mutation is staged on a copy and only becomes visible once the
//!   copy is on disk, so a failed write leaves the store as it was.

use fs2::FileExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{Card, CardQuery, CardStore, InitiativeEntry, InitiativeStore, StoreError};
use crate::logutil::escape_log;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    cards: BTreeMap<String, Card>,
    #[serde(default)]
    links: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    initiative: BTreeMap<String, Vec<InitiativeEntry>>,
}

#[derive(Debug, Default)]
pub struct MemoryCardStore {
    state: Mutex<StoreFile>,
    path: Option<PathBuf>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or start) a JSON-backed store. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let mut f = fs::OpenOptions::new().read(true).open(&path)?;
            f.lock_shared()?;
            let mut s = String::new();
            let read = f.read_to_string(&mut s);
            let _ = f.unlock();
            read?;
            let cleaned = s.trim_start_matches('\0').trim();
            if cleaned.is_empty() {
                StoreFile::default()
            } else {
                serde_json::from_str(cleaned)?
            }
        } else {
            StoreFile::default()
        };
        debug!("card store {:?}: {} cards loaded", path, state.cards.len());
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Seed helper: insert cards without touching the file.
    pub fn with_cards<I: IntoIterator<Item = Card>>(self, cards: I) -> Self {
        {
            let mut state = self.lock();
            for card in cards {
                state.cards.insert(card.name.clone(), card);
            }
        }
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, StoreFile> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, state: &StoreFile) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let data = serde_json::to_string_pretty(state)?;
        let mut f = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        f.lock_exclusive()?;
        // truncate only once the lock is held
        let written = f
            .set_len(0)
            .and_then(|_| f.write_all(data.as_bytes()))
            .and_then(|_| f.flush())
            .and_then(|_| f.sync_all());
        let _ = f.unlock();
        written?;
        Ok(())
    }

    /// Persist `next` and make it the live state. On error the live state is untouched.
    fn commit(&self, live: &mut StoreFile, next: StoreFile) -> Result<(), StoreError> {
        self.persist(&next)?;
        *live = next;
        Ok(())
    }

    /// Resolve a stored card name case-insensitively.
    fn canonical_name(state: &StoreFile, name: &str) -> Option<String> {
        if state.cards.contains_key(name) {
            return Some(name.to_string());
        }
        let lowered = name.to_lowercase();
        state.cards.keys().find(|k| k.to_lowercase() == lowered).cloned()
    }
}

impl CardStore for MemoryCardStore {
    fn query_card(&self, query: &CardQuery) -> Result<Vec<Card>, StoreError> {
        let state = self.lock();
        Ok(state.cards.values().filter(|c| query.matches(c)).cloned().collect())
    }

    fn get_card(&self, name: &str) -> Result<Option<Card>, StoreError> {
        let state = self.lock();
        Ok(Self::canonical_name(&state, name).and_then(|n| state.cards.get(&n).cloned()))
    }

    fn save_card(&self, card: Card) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let name = card.name.clone();
        next.cards.insert(card.name.clone(), card);
        self.commit(&mut state, next)?;
        info!("card saved: {}", escape_log(&name));
        Ok(())
    }

    fn link_card(&self, name: Option<&str>, channel_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        match name {
            Some(name) => {
                let canonical =
                    Self::canonical_name(&next, name).ok_or_else(|| StoreError::CardNotFound(name.to_string()))?;
                info!(
                    "link {}/{} -> {}",
                    escape_log(channel_id),
                    escape_log(user_id),
                    escape_log(&canonical)
                );
                next.links
                    .entry(channel_id.to_string())
                    .or_default()
                    .insert(user_id.to_string(), canonical);
            }
            None => {
                let mut emptied = false;
                if let Some(users) = next.links.get_mut(channel_id) {
                    users.remove(user_id);
                    emptied = users.is_empty();
                }
                if emptied {
                    next.links.remove(channel_id);
                }
                info!("link {}/{} cleared", escape_log(channel_id), escape_log(user_id));
            }
        }
        self.commit(&mut state, next)
    }

    fn linked_card(&self, channel_id: &str, user_id: &str) -> Result<Option<String>, StoreError> {
        let state = self.lock();
        Ok(state
            .links
            .get(channel_id)
            .and_then(|users| users.get(user_id))
            .filter(|name| state.cards.contains_key(*name))
            .cloned())
    }

    fn update_card(&self, name: &str, f: &mut dyn FnMut(&mut Card)) -> Result<Card, StoreError> {
        let mut state = self.lock();
        let canonical =
            Self::canonical_name(&state, name).ok_or_else(|| StoreError::CardNotFound(name.to_string()))?;
        let mut next = state.clone();
        let updated = match next.cards.get_mut(&canonical) {
            Some(card) => {
                f(card);
                card.clone()
            }
            None => return Err(StoreError::CardNotFound(name.to_string())),
        };
        self.commit(&mut state, next)?;
        Ok(updated)
    }
}

impl InitiativeStore for MemoryCardStore {
    fn initiative_list(&self, channel_id: &str) -> Result<Vec<InitiativeEntry>, StoreError> {
        Ok(self.lock().initiative.get(channel_id).cloned().unwrap_or_default())
    }

    fn set_initiative(&self, channel_id: &str, entry: InitiativeEntry) -> Result<Vec<InitiativeEntry>, StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let list = next.initiative.entry(channel_id.to_string()).or_default();
        list.retain(|e| e.name != entry.name);
        // after the last entry with an equal or higher value, so ties keep arrival order
        let at = list.iter().position(|e| e.value < entry.value).unwrap_or(list.len());
        list.insert(at, entry);
        let snapshot = list.clone();
        if let Err(e) = self.commit(&mut state, next) {
            warn!("initiative not persisted: {}", e);
            return Err(e);
        }
        Ok(snapshot)
    }

    fn clear_initiative(&self, channel_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        let mut next = state.clone();
        next.initiative.remove(channel_id);
        self.commit(&mut state, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardType;

    fn entry(name: &str, value: i64) -> InitiativeEntry {
        InitiativeEntry {
            name: name.into(),
            value,
            detail: value.to_string(),
        }
    }

    #[test]
    fn link_requires_existing_card() {
        let store = MemoryCardStore::new().with_cards([Card::new("Alice", CardType::Coc)]);
        assert!(matches!(
            store.link_card(Some("Nobody"), "c1", "u1"),
            Err(StoreError::CardNotFound(_))
        ));
        store.link_card(Some("alice"), "c1", "u1").unwrap();
        assert_eq!(store.linked_card("c1", "u1").unwrap().as_deref(), Some("Alice"));
        assert_eq!(store.linked_card("c2", "u1").unwrap(), None);
        store.link_card(None, "c1", "u1").unwrap();
        assert_eq!(store.linked_card("c1", "u1").unwrap(), None);
    }

    #[test]
    fn update_returns_new_copy() {
        let store = MemoryCardStore::new().with_cards([Card::new("Alice", CardType::Coc).with_entry("hp", 10)]);
        let card = store.update_card("Alice", &mut |c: &mut Card| c.set_entry("hp", 7, false)).unwrap();
        assert_eq!(card.value("hp"), Some(7));
        assert!(store.update_card("Bob", &mut |_: &mut Card| {}).is_err());
    }

    #[test]
    fn initiative_is_sorted_and_replaces_by_name() {
        let store = MemoryCardStore::new();
        store.set_initiative("c", entry("A", 10)).unwrap();
        store.set_initiative("c", entry("B", 15)).unwrap();
        store.set_initiative("c", entry("C", 10)).unwrap();
        let list = store.set_initiative("c", entry("A", 3)).unwrap();
        let names: Vec<_> = list.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
        store.clear_initiative("c").unwrap();
        assert!(store.initiative_list("c").unwrap().is_empty());
    }
}
