//! `ri`: initiative rolls and the per-channel initiative list.

use regex_lite::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::bot::roles::Feature;
use crate::card::{CardType, InitiativeEntry};
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

static ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<op>[+\-=])\s*(?P<n>\d+))?\s*(?P<name>.*)$").expect("valid regex")
});

fn list_json(list: &[InitiativeEntry]) -> Vec<Value> {
    list.iter()
        .enumerate()
        .map(|(i, e)| json!({"rank": i + 1, "name": e.name, "value": e.value, "detail": e.detail}))
        .collect()
}

fn signed(n: i64) -> String {
    if n < 0 {
        n.to_string()
    } else {
        format!("+{}", n)
    }
}

#[derive(Debug, Clone)]
enum State {
    Pending,
    Rolled(InitiativeEntry),
    Invalid(String),
}

/// `ri [+N|-N|=N] [name]`
#[derive(Debug, Clone)]
pub struct InitiativeRoll {
    args: String,
    state: State,
    list: Vec<InitiativeEntry>,
}

impl InitiativeRoll {
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            state: State::Pending,
            list: Vec::new(),
        }
    }
}

impl SpecialDice for InitiativeRoll {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Ri)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let Some(caps) = ARGS_RE.captures(self.args.trim()) else {
            self.state = State::Invalid("expected [+N|-N|=N] [name]".into());
            return Ok(());
        };
        let op = caps.name("op").map(|m| m.as_str());
        let n = match caps.name("n").map(|m| m.as_str().parse::<i64>()) {
            Some(Ok(n)) => Some(n),
            Some(Err(_)) => {
                self.state = State::Invalid("modifier out of range".into());
                return Ok(());
            }
            None => None,
        };
        let explicit_name = caps.name("name").map(|m| m.as_str().trim()).unwrap_or_default();

        let card = rc.services.linked_card(rc.ctx)?;
        let name = if !explicit_name.is_empty() {
            explicit_name.to_string()
        } else if let Some(card) = &card {
            card.name.clone()
        } else {
            rc.ctx.user_name.clone()
        };

        let entry = match (op, n) {
            (Some("="), Some(value)) => InitiativeEntry {
                name,
                value,
                detail: value.to_string(),
            },
            _ => {
                let modifier = match (op, n) {
                    (Some("-"), Some(n)) => -n,
                    (Some(_), Some(n)) => n,
                    _ => card
                        .as_ref()
                        .filter(|c| c.card_type == CardType::Dnd && explicit_name.is_empty())
                        .and_then(|c| c.ability_modifier("dex"))
                        .unwrap_or(0),
                };
                let die = i64::from(rc.random.roll_die(20));
                let detail = if modifier == 0 {
                    die.to_string()
                } else {
                    format!("{}{}", die, signed(modifier))
                };
                InitiativeEntry {
                    name,
                    value: die + modifier,
                    detail,
                }
            }
        };
        self.state = State::Rolled(entry);
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        matches!(self.state, State::Rolled(_))
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        if let State::Rolled(entry) = &self.state {
            self.list = ac
                .services
                .initiative
                .set_initiative(&ac.ctx.channel_id, entry.clone())?;
        }
        Ok(Vec::new())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let text = match &self.state {
            State::Pending => String::new(),
            State::Invalid(message) => rc.builtin(
                CustomTextKey::RollError,
                json!({"expression": format!("ri {}", self.args), "errorMessage": message}),
            )?,
            State::Rolled(entry) => rc.builtin(
                CustomTextKey::RiSet,
                json!({
                    "name": entry.name,
                    "detail": entry.detail,
                    "value": entry.value,
                    "list": list_json(&self.list),
                }),
            )?,
        };
        Ok(Rendered::public(text))
    }
}

/// `ri list` / `init`
#[derive(Debug, Clone, Default)]
pub struct InitiativeList {
    list: Vec<InitiativeEntry>,
}

impl InitiativeList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecialDice for InitiativeList {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Ri)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.list = rc.services.initiative.initiative_list(&rc.ctx.channel_id)?;
        Ok(())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        Ok(Rendered::public(rc.builtin(
            CustomTextKey::RiList,
            json!({"list": list_json(&self.list)}),
        )?))
    }
}

/// `ri clear` / `init clr`
#[derive(Debug, Clone, Default)]
pub struct InitiativeClear;

impl SpecialDice for InitiativeClear {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Ri)
    }

    fn roll(&mut self, _rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        true
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        ac.services.initiative.clear_initiative(&ac.ctx.channel_id)?;
        Ok(Vec::new())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        Ok(Rendered::public(rc.builtin(CustomTextKey::RiClear, json!({}))?))
    }
}
