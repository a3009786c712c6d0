//! `sc <success loss>/<failure loss> [san]`: sanity check.

use regex_lite::Regex;
use serde_json::json;
use std::sync::LazyLock;

use crate::bot::roles::Feature;
use crate::card::Card;
use crate::dice::{coc_check, DiceExpression, SuccessLevel};
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

static ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<success>[^/\s]+)\s*/\s*(?P<failure>[^\s]+)(?:\s+(?P<san>\d+))?$").expect("valid regex")
});

/// Loss of at least this much in one check triggers the temporary insanity note.
pub const TEMPORARY_INSANITY_LOSS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityResult {
    pub roll: u32,
    pub sanity: i64,
    pub level: SuccessLevel,
    pub loss_detail: String,
    pub loss: i64,
    pub new_sanity: i64,
}

impl SanityResult {
    pub fn temporary(&self) -> bool {
        self.loss >= TEMPORARY_INSANITY_LOSS
    }

    pub fn insane(&self) -> bool {
        self.new_sanity <= 0
    }
}

#[derive(Debug, Clone)]
enum State {
    Pending,
    NoCard,
    Invalid(String),
    Done {
        result: SanityResult,
        card: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct SanityCheck {
    args: String,
    state: State,
}

impl SanityCheck {
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

impl SpecialDice for SanityCheck {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Sc)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let sides = rc.ctx.config.default_sides;
        let args = self.args.clone();
        let Some(caps) = ARGS_RE.captures(args.trim()) else {
            return self.invalid("expected <success loss>/<failure loss> [san]");
        };
        let parse = |group: &str| {
            caps.name(group)
                .map(|m| DiceExpression::parse(m.as_str(), sides))
                .transpose()
        };
        let (success_expr, failure_expr) = match (parse("success"), parse("failure")) {
            (Ok(Some(s)), Ok(Some(f))) => (s, f),
            (Err(e), _) | (_, Err(e)) => return self.invalid(e.to_string()),
            _ => return self.invalid("expected <success loss>/<failure loss> [san]"),
        };
        let explicit = caps.name("san").and_then(|m| m.as_str().parse::<i64>().ok());

        let (sanity, card) = match explicit {
            Some(v) => (v, None),
            None => {
                let Some(card) = rc.services.linked_card(rc.ctx)? else {
                    self.state = State::NoCard;
                    return Ok(());
                };
                match card.value("sanity") {
                    Some(v) => (v, Some(card.name)),
                    None => return self.invalid(format!("{} has no sanity value", card.name)),
                }
            }
        };

        let roll = rc.random.roll_die(100);
        let level = coc_check(roll, sanity);
        let outcome = match level {
            SuccessLevel::Fumble => failure_expr.maximum(),
            l if l.is_success() => success_expr.roll(rc.random),
            _ => failure_expr.roll(rc.random),
        };
        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => return self.invalid(e.to_string()),
        };
        let loss = outcome.total.max(0);
        let loss_detail = if outcome.detail == outcome.total.to_string() {
            outcome.expression.clone()
        } else {
            format!("{}={}", outcome.expression, outcome.detail)
        };
        self.state = State::Done {
            result: SanityResult {
                roll,
                sanity,
                level,
                loss_detail,
                loss,
                new_sanity: (sanity - loss).max(0),
            },
            card,
        };
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        matches!(&self.state, State::Done { card: Some(_), .. })
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let State::Done {
            result,
            card: Some(name),
        } = &mut self.state
        else {
            return Ok(Vec::new());
        };
        let loss = result.loss;
        let mut stored = None;
        ac.services.cards.update_card(name, &mut |card: &mut Card| {
            let current = card.value("sanity").unwrap_or(0);
            let next = (current - loss).max(0);
            card.set_entry("sanity", next, false);
            stored = Some((current, next));
        })?;
        if let Some((current, next)) = stored {
            result.sanity = current;
            result.new_sanity = next;
        }
        Ok(vec![name.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let text = match &self.state {
            State::Pending => String::new(),
            State::NoCard => rc.builtin(CustomTextKey::CardEmpty, json!({}))?,
            State::Invalid(message) => rc.builtin(
                CustomTextKey::RollError,
                json!({"expression": format!("sc {}", self.args), "errorMessage": message}),
            )?,
            State::Done { result, card } => {
                let vars = json!({
                    "cardName": card.clone().unwrap_or_else(|| rc.ctx.user_name.clone()),
                    "roll": result.roll,
                    "sanity": result.sanity,
                    "level": result.level.label(),
                    "success": result.level.is_success(),
                    "lossDetail": result.loss_detail,
                    "loss": result.loss,
                    "newSanity": result.new_sanity,
                    "temporary": result.temporary(),
                    "insane": result.insane(),
                });
                let mut text = rc.builtin(CustomTextKey::ScResult, vars.clone())?;
                if result.temporary() || result.insane() {
                    let extra = rc.builtin(CustomTextKey::ScExtra, vars)?;
                    if !extra.is_empty() {
                        text.push('\n');
                        text.push_str(&extra);
                    }
                }
                text
            }
        };
        Ok(Rendered::public(text))
    }
}
