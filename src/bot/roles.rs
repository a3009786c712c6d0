//! Role levels, write policies and the permission check.
//!
//! Levels are plain numbers; higher implies a superset of lower capabilities.
//! Use [role_name] for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::context::Context;

/// Role / privilege level constants
pub const LEVEL_MEMBER: u8 = 1;
pub const LEVEL_MANAGER: u8 = 5;
pub const LEVEL_OWNER: u8 = 10;

/// Return the human‑readable role name for a numeric level.
///
/// Levels ≥10 are "Owner", ≥5 "Manager", otherwise "Member".
pub fn role_name(level: u8) -> &'static str {
    match level {
        l if l >= LEVEL_OWNER => "Owner",
        l if l >= LEVEL_MANAGER => "Manager",
        _ => "Member",
    }
}

/// Who may let a command mutate cards or channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    #[default]
    All,
    Linked,
    Manager,
    Owner,
    None,
}

impl WritePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            WritePolicy::All => "all",
            WritePolicy::Linked => "linked",
            WritePolicy::Manager => "manager",
            WritePolicy::Owner => "owner",
            WritePolicy::None => "none",
        }
    }
}

/// Gated command families. Plugin commands carry their plugin-chosen id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Feature {
    Nn,
    Vs,
    Ds,
    En,
    Ri,
    Sc,
    St,
    Plugin(String),
}

impl Feature {
    pub const BUILTIN: [Feature; 7] = [
        Feature::Nn,
        Feature::Vs,
        Feature::Ds,
        Feature::En,
        Feature::Ri,
        Feature::Sc,
        Feature::St,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Feature::Nn => "nn",
            Feature::Vs => "vs",
            Feature::Ds => "ds",
            Feature::En => "en",
            Feature::Ri => "ri",
            Feature::Sc => "sc",
            Feature::St => "st",
            Feature::Plugin(id) => id,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Ok(Feature::BUILTIN
            .iter()
            .find(|f| f.as_str() == lowered)
            .cloned()
            .unwrap_or(Feature::Plugin(lowered)))
    }
}

/// Decide whether the invoker may mutate under `policy`. Pure: everything it
/// needs is already on the context.
pub fn has_permission(policy: WritePolicy, ctx: &Context) -> bool {
    match policy {
        WritePolicy::All => true,
        WritePolicy::Linked => ctx.linked_card.is_some(),
        WritePolicy::Manager => ctx.is_direct || ctx.user_level >= LEVEL_MANAGER,
        WritePolicy::Owner => ctx.user_level >= LEVEL_OWNER,
        WritePolicy::None => false,
    }
}
