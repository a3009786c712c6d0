//! `vs <skill|value> <opponent value>`: opposed percentile roll.

use regex_lite::Regex;
use serde_json::json;
use std::cmp::Ordering;
use std::sync::LazyLock;

use crate::bot::roles::Feature;
use crate::dice::{coc_check, SuccessLevel};
use crate::engine::{EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

static SIDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*?)\s*(?P<value>\d+)?$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Side {
    pub value: i64,
    pub roll: u32,
    pub level: SuccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Pending,
    Done {
        skill: String,
        mine: Side,
        theirs: Side,
        outcome: Ordering,
    },
    NoCard,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Versus {
    args: String,
    state: State,
}

/// Opposed result: success level first, then the higher skill. Two failures draw.
pub fn compare(mine: &Side, theirs: &Side) -> Ordering {
    match mine.level.cmp(&theirs.level) {
        Ordering::Equal if !mine.level.is_success() => Ordering::Equal,
        Ordering::Equal => mine.value.cmp(&theirs.value),
        other => other,
    }
}

impl Versus {
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            state: State::Pending,
        }
    }

    fn invalid(&mut self, message: impl Into<String>) -> Result<(), EngineError> {
        self.state = State::Invalid(message.into());
        Ok(())
    }
}

impl SpecialDice for Versus {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Vs)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let args = self.args.clone();
        let mut words: Vec<&str> = args.split_whitespace().collect();
        let Some(opponent) = words.pop() else {
            return self.invalid("expected a skill and an opponent value");
        };
        let Ok(opponent_value) = opponent.parse::<i64>() else {
            return self.invalid(format!("opponent value '{}' is not a number", opponent));
        };
        let mine = words.join(" ");
        let Some(caps) = SIDE_RE.captures(&mine) else {
            return self.invalid("expected a skill and an opponent value");
        };
        let name = caps.name("name").map(|m| m.as_str().trim()).unwrap_or_default().to_string();
        let explicit = caps.name("value").and_then(|m| m.as_str().parse::<i64>().ok());

        let (skill, value) = match (name.is_empty(), explicit) {
            (true, None) => return self.invalid("expected a skill and an opponent value"),
            (_, Some(v)) => (name, v),
            (false, None) => {
                let Some(card) = rc.services.linked_card(rc.ctx)? else {
                    self.state = State::NoCard;
                    return Ok(());
                };
                match card.value(&name) {
                    Some(v) => (name, v),
                    None => return self.invalid(format!("{} has no '{}'", card.name, name)),
                }
            }
        };

        let my_roll = rc.random.roll_die(100);
        let their_roll = rc.random.roll_die(100);
        let mine = Side {
            value,
            roll: my_roll,
            level: coc_check(my_roll, value),
        };
        let theirs = Side {
            value: opponent_value,
            roll: their_roll,
            level: coc_check(their_roll, opponent_value),
        };
        let outcome = compare(&mine, &theirs);
        self.state = State::Done {
            skill,
            mine,
            theirs,
            outcome,
        };
        Ok(())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let text = match &self.state {
            State::Pending => String::new(),
            State::NoCard => rc.builtin(CustomTextKey::CardEmpty, json!({}))?,
            State::Invalid(message) => rc.builtin(
                CustomTextKey::RollError,
                json!({"expression": format!("vs {}", self.args), "errorMessage": message}),
            )?,
            State::Done {
                skill,
                mine,
                theirs,
                outcome,
            } => rc.builtin(
                CustomTextKey::VsResult,
                json!({
                    "skill": skill,
                    "skillValue": mine.value,
                    "roll": mine.roll,
                    "level": mine.level.label(),
                    "opponentValue": theirs.value,
                    "opponentRoll": theirs.roll,
                    "opponentLevel": theirs.level.label(),
                    "win": *outcome == Ordering::Greater,
                    "lose": *outcome == Ordering::Less,
                    "draw": *outcome == Ordering::Equal,
                }),
            )?,
        };
        Ok(Rendered::public(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(value: i64, roll: u32) -> Side {
        Side {
            value,
            roll,
            level: coc_check(roll, value),
        }
    }

    #[test]
    fn better_level_wins() {
        assert_eq!(compare(&side(50, 10), &side(80, 70)), Ordering::Greater);
        assert_eq!(compare(&side(50, 60), &side(80, 70)), Ordering::Less);
    }

    #[test]
    fn equal_level_prefers_higher_skill() {
        assert_eq!(compare(&side(60, 40), &side(50, 40)), Ordering::Greater);
        assert_eq!(compare(&side(50, 40), &side(50, 45)), Ordering::Equal);
    }

    #[test]
    fn two_failures_draw() {
        assert_eq!(compare(&side(20, 90), &side(70, 80)), Ordering::Equal);
    }
}
