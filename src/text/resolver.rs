//! Weighted text selection and the three-level fallback chain.

use log::{error, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::defaults::default_text;
use super::keys::CustomTextKey;
use super::template;
use crate::dice::RandomSource;
use crate::engine::EngineError;

/// A code-provided text: receives the render environment, returns final text.
pub type TextHandler = Arc<dyn Fn(&Value) -> String + Send + Sync>;

fn default_weight() -> f64 {
    1.0
}

/// One candidate text in a weighted list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTextItem {
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub text: String,
}

impl CustomTextItem {
    pub fn new(weight: f64, text: impl Into<String>) -> Self {
        Self {
            weight,
            text: text.into(),
        }
    }
}

/// A text key is configured by a weighted list or by a handler, never both.
#[derive(Clone)]
pub enum CustomTextEntry {
    Items(Vec<CustomTextItem>),
    Handler(TextHandler),
}

impl fmt::Debug for CustomTextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomTextEntry::Items(items) => f.debug_tuple("Items").field(items).finish(),
            CustomTextEntry::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl CustomTextEntry {
    /// An empty item list configures nothing.
    fn is_usable(&self) -> bool {
        match self {
            CustomTextEntry::Items(items) => !items.is_empty(),
            CustomTextEntry::Handler(_) => true,
        }
    }
}

/// Per-channel text overrides, keyed by text id (`roll.result`, `myplugin.hello`, ...).
#[derive(Debug, Clone, Default)]
pub struct CustomTextConfig {
    entries: HashMap<String, CustomTextEntry>,
}

impl CustomTextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(map: &HashMap<String, Vec<CustomTextItem>>) -> Self {
        let mut cfg = Self::new();
        for (key, items) in map {
            cfg.set_items(key.clone(), items.clone());
        }
        cfg
    }

    pub fn set_items(&mut self, key: impl Into<String>, items: Vec<CustomTextItem>) {
        self.entries.insert(key.into(), CustomTextEntry::Items(items));
    }

    pub fn set_handler(&mut self, key: impl Into<String>, handler: TextHandler) {
        self.entries.insert(key.into(), CustomTextEntry::Handler(handler));
    }

    pub fn get(&self, key: &str) -> Option<&CustomTextEntry> {
        self.entries.get(key).filter(|e| e.is_usable())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Copy entries from `other` that this table does not define.
    pub fn merge_from(&mut self, other: &CustomTextConfig) {
        for (key, entry) in &other.entries {
            self.entries
                .entry(key.clone())
                .or_insert_with(|| entry.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

fn effective_weight(w: f64) -> f64 {
    if w.is_finite() && w > 0.0 {
        w
    } else {
        0.0
    }
}

/// Choose an index given a `draw` in `[0, 1)`.
///
/// Scans running sums of the weights and returns the first index whose running
/// sum is strictly greater than `draw * total`. Zero, negative and NaN weights
/// never win. When nothing has positive weight the pick is uniform:
/// `floor(draw * len)`. Returns `None` only for an empty slice.
pub fn pick_index(weights: &[f64], draw: f64) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let draw = if draw.is_finite() { draw.clamp(0.0, 1.0) } else { 0.0 };
    let total: f64 = weights.iter().copied().map(effective_weight).sum();
    if total <= 0.0 {
        let idx = (draw * weights.len() as f64).floor() as usize;
        return Some(idx.min(weights.len() - 1));
    }
    let target = draw * total;
    let mut running = 0.0;
    let mut last_positive = 0;
    for (i, w) in weights.iter().copied().map(effective_weight).enumerate() {
        if w <= 0.0 {
            continue;
        }
        running += w;
        last_positive = i;
        if target < running {
            return Some(i);
        }
    }
    // float rounding can leave target == total
    Some(last_positive)
}

/// Pick one item; draws from `random` only when there is an actual choice.
pub fn pick_weighted<'a>(items: &'a [CustomTextItem], random: &mut dyn RandomSource) -> Option<&'a CustomTextItem> {
    match items.len() {
        0 => None,
        1 => items.first(),
        _ => {
            let weights: Vec<f64> = items.iter().map(|i| i.weight).collect();
            pick_index(&weights, random.unit()).and_then(|i| items.get(i))
        }
    }
}

/// Resolves a text key to final output text.
///
/// Lookup order: the channel's table, then defaults registered by plugins,
/// then the built-in table for [`CustomTextKey`] ids.
#[derive(Debug, Clone, Default)]
pub struct TextResolver {
    plugin_defaults: CustomTextConfig,
}

impl TextResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin_defaults(plugin_defaults: CustomTextConfig) -> Self {
        Self { plugin_defaults }
    }

    pub fn register_default(&mut self, key: impl Into<String>, items: Vec<CustomTextItem>) {
        self.plugin_defaults.set_items(key, items);
    }

    pub fn register_handler(&mut self, key: impl Into<String>, handler: TextHandler) {
        self.plugin_defaults.set_handler(key, handler);
    }

    /// True when `key` resolves without a channel table.
    pub fn knows(&self, key: &str) -> bool {
        self.plugin_defaults.contains(key) || key.parse::<CustomTextKey>().is_ok()
    }

    pub fn resolve(
        &self,
        key: &str,
        env: &Value,
        channel: &CustomTextConfig,
        random: &mut dyn RandomSource,
    ) -> Result<String, EngineError> {
        if let Some(entry) = channel.get(key).or_else(|| self.plugin_defaults.get(key)) {
            return Ok(match entry {
                CustomTextEntry::Handler(handler) => handler(env),
                CustomTextEntry::Items(items) => match pick_weighted(items, random) {
                    Some(item) => {
                        trace!("text {} -> {:?}", key, item.text);
                        template::render(&item.text, env)
                    }
                    None => String::new(),
                },
            });
        }

        let Ok(builtin) = key.parse::<CustomTextKey>() else {
            error!("no text registered for key '{}'", key);
            return Err(EngineError::UnknownTextKey(key.to_string()));
        };
        Ok(template::render(default_text(builtin), env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedSource;
    use serde_json::json;

    #[test]
    fn scan_uses_strict_less_than() {
        let w = [1.0, 1.0];
        assert_eq!(pick_index(&w, 0.0), Some(0));
        assert_eq!(pick_index(&w, 0.49), Some(0));
        assert_eq!(pick_index(&w, 0.5), Some(1));
        assert_eq!(pick_index(&w, 0.999), Some(1));
    }

    #[test]
    fn zero_and_negative_weights_never_win() {
        let w = [0.0, -3.0, 2.0, f64::NAN];
        for draw in [0.0, 0.3, 0.7, 0.9999] {
            assert_eq!(pick_index(&w, draw), Some(2));
        }
    }

    #[test]
    fn all_zero_is_uniform() {
        let w = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(pick_index(&w, 0.0), Some(0));
        assert_eq!(pick_index(&w, 0.26), Some(1));
        assert_eq!(pick_index(&w, 0.99), Some(3));
        assert_eq!(pick_index(&[], 0.5), None);
    }

    #[test]
    fn single_item_consumes_no_draw() {
        let items = vec![CustomTextItem::new(1.0, "only")];
        let mut src = ScriptedSource::new().with_units([0.9]);
        assert_eq!(pick_weighted(&items, &mut src).map(|i| i.text.as_str()), Some("only"));
        assert_eq!(src.unit(), 0.9);
    }

    #[test]
    fn handler_output_is_verbatim() {
        let mut channel = CustomTextConfig::new();
        channel.set_handler(
            "roll.result",
            Arc::new(|env: &Value| format!("{{{{raw}}}} {}", env["result"])),
        );
        let resolver = TextResolver::new();
        let mut src = ScriptedSource::new();
        let out = resolver
            .resolve("roll.result", &json!({"result": 7}), &channel, &mut src)
            .unwrap();
        assert_eq!(out, "{{raw}} 7");
    }

    #[test]
    fn empty_list_falls_back() {
        let mut channel = CustomTextConfig::new();
        channel.set_items("ri.clear", Vec::new());
        let resolver = TextResolver::new();
        let mut src = ScriptedSource::new();
        let out = resolver.resolve("ri.clear", &json!({}), &channel, &mut src).unwrap();
        assert_eq!(out, "Initiative list cleared.");
    }

    #[test]
    fn unknown_key_is_an_error() {
        let resolver = TextResolver::new();
        let mut src = ScriptedSource::new();
        let err = resolver
            .resolve("nope.nope", &json!({}), &CustomTextConfig::new(), &mut src)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownTextKey(k) if k == "nope.nope"));
    }

    #[test]
    fn plugin_default_sits_between_channel_and_builtin() {
        let mut resolver = TextResolver::new();
        resolver.register_default("ri.clear", vec![CustomTextItem::new(1.0, "plugin")]);
        let mut channel = CustomTextConfig::new();
        let mut src = ScriptedSource::new();
        assert_eq!(resolver.resolve("ri.clear", &json!({}), &channel, &mut src).unwrap(), "plugin");
        channel.set_items("ri.clear", vec![CustomTextItem::new(1.0, "channel")]);
        assert_eq!(resolver.resolve("ri.clear", &json!({}), &channel, &mut src).unwrap(), "channel");
    }
}
