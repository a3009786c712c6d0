//! The enumerated custom text key-space.
//!
//! Adding a key is backward compatible. Renaming or removing one breaks every
//! channel config that overrides it, so the string ids are frozen once shipped.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CustomTextKey {
    RollResult,
    RollHidden,
    RollError,
    CardEmpty,
    CardNoPermission,
    NnShow,
    NnLink,
    NnSearch,
    NnClear,
    VsResult,
    DsResult,
    DsEnd,
    EnResult,
    EnMark,
    EnEmpty,
    RiSet,
    RiList,
    RiClear,
    ScResult,
    ScExtra,
    StShow,
    StSet,
}

impl CustomTextKey {
    pub const ALL: [CustomTextKey; 22] = [
        CustomTextKey::RollResult,
        CustomTextKey::RollHidden,
        CustomTextKey::RollError,
        CustomTextKey::CardEmpty,
        CustomTextKey::CardNoPermission,
        CustomTextKey::NnShow,
        CustomTextKey::NnLink,
        CustomTextKey::NnSearch,
        CustomTextKey::NnClear,
        CustomTextKey::VsResult,
        CustomTextKey::DsResult,
        CustomTextKey::DsEnd,
        CustomTextKey::EnResult,
        CustomTextKey::EnMark,
        CustomTextKey::EnEmpty,
        CustomTextKey::RiSet,
        CustomTextKey::RiList,
        CustomTextKey::RiClear,
        CustomTextKey::ScResult,
        CustomTextKey::ScExtra,
        CustomTextKey::StShow,
        CustomTextKey::StSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CustomTextKey::RollResult => "roll.result",
            CustomTextKey::RollHidden => "roll.hidden",
            CustomTextKey::RollError => "roll.error",
            CustomTextKey::CardEmpty => "card.empty",
            CustomTextKey::CardNoPermission => "card.nopermission",
            CustomTextKey::NnShow => "nn.show",
            CustomTextKey::NnLink => "nn.link",
            CustomTextKey::NnSearch => "nn.search",
            CustomTextKey::NnClear => "nn.clear",
            CustomTextKey::VsResult => "vs.result",
            CustomTextKey::DsResult => "ds.result",
            CustomTextKey::DsEnd => "ds.end",
            CustomTextKey::EnResult => "en.result",
            CustomTextKey::EnMark => "en.mark",
            CustomTextKey::EnEmpty => "en.empty",
            CustomTextKey::RiSet => "ri.set",
            CustomTextKey::RiList => "ri.list",
            CustomTextKey::RiClear => "ri.clear",
            CustomTextKey::ScResult => "sc.result",
            CustomTextKey::ScExtra => "sc.extra",
            CustomTextKey::StShow => "st.show",
            CustomTextKey::StSet => "st.set",
        }
    }

    /// Variables available to templates for this key, for `rolldeck keys`.
    pub fn variables(self) -> &'static str {
        match self {
            CustomTextKey::RollResult => "description, expression, detail, result, rolls[text, expression, detail, total]",
            CustomTextKey::RollHidden => "description",
            CustomTextKey::RollError => "expression, errorMessage",
            CustomTextKey::CardEmpty | CustomTextKey::CardNoPermission => "(common only)",
            CustomTextKey::NnShow | CustomTextKey::NnLink | CustomTextKey::NnClear => "cardName",
            CustomTextKey::NnSearch => "keyword, cards[name]",
            CustomTextKey::VsResult => {
                "skill, skillValue, roll, level, opponentValue, opponentRoll, opponentLevel, win, lose, draw"
            }
            CustomTextKey::DsResult | CustomTextKey::DsEnd => {
                "roll, success, successes, failures, stable, dead, revived"
            }
            CustomTextKey::EnResult => "skills[skill, before, roll, success, gain, after, missing]",
            CustomTextKey::EnMark => "skills[skill]",
            CustomTextKey::EnEmpty | CustomTextKey::RiClear => "(common only)",
            CustomTextKey::RiSet => "name, detail, value, list[rank, name, value]",
            CustomTextKey::RiList => "list[rank, name, value]",
            CustomTextKey::ScResult | CustomTextKey::ScExtra => {
                "roll, sanity, level, success, lossDetail, loss, newSanity, temporary, insane"
            }
            CustomTextKey::StShow => "entries[key, value]",
            CustomTextKey::StSet => "changes[key, before, after]",
        }
    }
}

impl fmt::Display for CustomTextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomTextKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CustomTextKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown text key '{}'", s))
    }
}
