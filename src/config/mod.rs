//! # Configuration Management Module
//!
//! Bot identity, logging, storage and per-channel behaviour, loaded from TOML.
//!
//! ## Configuration Structure
//!
//! - [`BotConfig`] - identity, command prefixes, owner / manager user ids
//! - [`LoggingConfig`] - log level and optional log file
//! - [`StorageConfig`] - where the card file lives
//! - [`ChannelConfig`] - `[defaults]` and `[channels."<id>"]` overrides
//! - `plugins` - free-form `[plugins.<id>]` tables read through `PluginContext::get_preference`
//!
//! Channel configs are layered: a channel's values win, anything it leaves out
//! comes from `[defaults]`, anything both leave out comes from built-in defaults.
//! [`Config::channel_settings`] produces the resolved [`ChannelSettings`] the
//! engine reads.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolldeck::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Bot: {}", config.bot.name);
//!     let settings = config.channel_settings("table-1");
//!     println!("default die: d{}", settings.default_sides);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! id = "rolldeck"
//! platform = "cli"
//! name = "Rolldeck"
//! command_prefixes = [".", "。"]
//! owners = ["u-admin"]
//!
//! [defaults]
//! default_dice = 100
//!
//! [defaults.special_dice.st]
//! writable = "linked"
//!
//! [channels."table-1"]
//! card_type = "coc"
//!
//! [[channels."table-1".texts."roll.result"]]
//! weight = 1.0
//! text = "{{userName}} -> {{result}}"
//! ```

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::fs;

use crate::bot::roles::{Feature, WritePolicy};
use crate::card::CardType;
use crate::dice::expr::MAX_SIDES;
use crate::text::{CustomTextConfig, CustomTextItem, CustomTextKey};

pub const DEFAULT_SIDES: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub id: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub name: String,
    /// Prefixes that mark a message as a command. An empty list falls back to `.` and `。`.
    #[serde(default = "default_prefixes")]
    pub command_prefixes: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
    #[serde(default)]
    pub managers: Vec<String>,
}

fn default_platform() -> String {
    "cli".to_string()
}

fn default_prefixes() -> Vec<String> {
    vec![".".to_string(), "。".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    #[serde(default = "default_cards_file")]
    pub cards_file: String,
}

fn default_cards_file() -> String {
    "cards.json".to_string()
}

impl StorageConfig {
    pub fn cards_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join(&self.cards_file)
    }
}

/// Per-feature switch and write policy. Unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writable: Option<WritePolicy>,
}

/// One layer of channel configuration (`[defaults]` or a `[channels."<id>"]` table).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Die size for bare `r` and `d` terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dice: Option<u32>,
    /// Restrict `nn` searches to one card type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub special_dice: BTreeMap<String, FeatureConfig>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub texts: HashMap<String, Vec<CustomTextItem>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSettings {
    pub enabled: bool,
    pub writable: WritePolicy,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            writable: WritePolicy::All,
        }
    }
}

/// Fully resolved settings for one channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub default_sides: u32,
    pub card_type: Option<CardType>,
    pub features: HashMap<String, FeatureSettings>,
    pub texts: CustomTextConfig,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            default_sides: DEFAULT_SIDES,
            card_type: None,
            features: HashMap::new(),
            texts: CustomTextConfig::new(),
        }
    }
}

impl ChannelSettings {
    pub fn feature(&self, feature: &Feature) -> FeatureSettings {
        self.features.get(feature.as_str()).copied().unwrap_or_default()
    }

    pub fn feature_enabled(&self, feature: &Feature) -> bool {
        self.feature(feature).enabled
    }

    pub fn write_policy(&self, feature: &Feature) -> WritePolicy {
        self.feature(feature).writable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub defaults: ChannelConfig,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
    #[serde(default)]
    pub plugins: HashMap<String, toml::Table>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml_str(&content).map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        for problem in config.validate() {
            warn!("config {}: {}", path, problem);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Non-fatal problems: unknown text keys, unknown features, odd die sizes.
    /// Plugin keys cannot be checked here, so only dotted ids that look like
    /// built-ins (same namespace) are reported.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.bot.id.trim().is_empty() {
            problems.push("bot.id is empty".to_string());
        }
        let mut layers: Vec<(String, &ChannelConfig)> = vec![("defaults".to_string(), &self.defaults)];
        let mut ids: Vec<&String> = self.channels.keys().collect();
        ids.sort();
        for id in ids {
            if let Some(ch) = self.channels.get(id) {
                layers.push((format!("channels.{}", id), ch));
            }
        }
        let builtin_namespaces: Vec<&str> = CustomTextKey::ALL
            .iter()
            .filter_map(|k| k.as_str().split('.').next())
            .collect();
        for (name, layer) in layers {
            if let Some(sides) = layer.default_dice {
                if sides == 0 || sides > MAX_SIDES {
                    problems.push(format!("{}: default_dice {} out of range 1-{}", name, sides, MAX_SIDES));
                }
            }
            for key in layer.texts.keys() {
                let namespace = key.split('.').next().unwrap_or_default();
                if builtin_namespaces.contains(&namespace) && key.parse::<CustomTextKey>().is_err() {
                    problems.push(format!("{}: unknown text key '{}'", name, key));
                }
            }
            for feature in layer.special_dice.keys() {
                if let Ok(Feature::Plugin(id)) = feature.parse::<Feature>() {
                    if !self.plugins.contains_key(&id) {
                        problems.push(format!("{}: special_dice.{} is not a built-in feature", name, id));
                    }
                }
            }
        }
        problems
    }

    /// Resolve `[defaults]` plus the channel's overrides.
    pub fn channel_settings(&self, channel_id: &str) -> ChannelSettings {
        let channel = self.channels.get(channel_id);
        let layers: Vec<&ChannelConfig> = std::iter::once(&self.defaults).chain(channel).collect();

        let mut settings = ChannelSettings::default();
        for layer in &layers {
            if let Some(sides) = layer.default_dice.filter(|s| *s > 0 && *s <= MAX_SIDES) {
                settings.default_sides = sides;
            }
            if layer.card_type.is_some() {
                settings.card_type = layer.card_type;
            }
            for (feature, cfg) in &layer.special_dice {
                let entry = settings.features.entry(feature.to_ascii_lowercase()).or_default();
                if let Some(enabled) = cfg.enabled {
                    entry.enabled = enabled;
                }
                if let Some(writable) = cfg.writable {
                    entry.writable = writable;
                }
            }
        }

        // channel texts replace default texts key by key
        let mut texts = CustomTextConfig::new();
        for layer in layers.iter().rev() {
            texts.merge_from(&CustomTextConfig::from_items(&layer.texts));
        }
        settings.texts = texts;
        settings
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut special_dice = BTreeMap::new();
        for feature in ["ds", "en", "sc", "st"] {
            special_dice.insert(
                feature.to_string(),
                FeatureConfig {
                    enabled: Some(true),
                    writable: Some(WritePolicy::Linked),
                },
            );
        }
        Config {
            bot: BotConfig {
                id: "rolldeck".to_string(),
                platform: default_platform(),
                name: "Rolldeck".to_string(),
                command_prefixes: default_prefixes(),
                owners: Vec::new(),
                managers: Vec::new(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("rolldeck.log".to_string()),
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                cards_file: default_cards_file(),
            },
            defaults: ChannelConfig {
                default_dice: Some(DEFAULT_SIDES),
                card_type: None,
                special_dice,
                texts: HashMap::new(),
            },
            channels: HashMap::new(),
            plugins: HashMap::new(),
        }
    }
}
