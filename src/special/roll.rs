//! The default arithmetic roll (`r`, `rh`, or any unmatched text).

use log::trace;
use regex_lite::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::bot::roles::Feature;
use crate::dice::{DiceError, DiceExpression, RollOutcome};
use crate::engine::{EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

pub const MAX_REPEAT: u32 = 10;
/// Longer input is refused before parsing.
pub const MAX_INPUT_CHARS: usize = 500;

static REPEAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*#\s*(.*)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
enum State {
    Pending,
    Rolled {
        description: String,
        outcomes: Vec<RollOutcome>,
    },
    Failed {
        expression: String,
        message: String,
    },
}

/// `[N#]expr [description]`. Text that does not start with an expression is
/// all description and rolls the channel's default die.
#[derive(Debug, Clone)]
pub struct ArithmeticRoll {
    input: String,
    hidden: bool,
    state: State,
}

impl ArithmeticRoll {
    pub fn new(input: impl Into<String>, hidden: bool) -> Self {
        Self {
            input: input.into(),
            hidden,
            state: State::Pending,
        }
    }

    /// Totals of every roll, empty before `roll` or on failure.
    pub fn totals(&self) -> Vec<i64> {
        match &self.state {
            State::Rolled { outcomes, .. } => outcomes.iter().map(|o| o.total).collect(),
            _ => Vec::new(),
        }
    }
}

/// Split input into an expression and a trailing description.
pub fn split_expression(input: &str, default_sides: u32) -> Result<(DiceExpression, String), DiceError> {
    let input = input.trim();
    let default_expr = || DiceExpression::parse(&format!("1d{}", default_sides), default_sides);
    if input.is_empty() {
        return Ok((default_expr()?, String::new()));
    }
    if let Ok((expr, rest)) = DiceExpression::parse_prefix(input, default_sides) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Ok((expr, rest.trim().to_string()));
        }
    }
    let first_word = input.split_whitespace().next().unwrap_or_default();
    if !first_word.chars().any(|c| c.is_ascii_digit()) {
        trace!("no expression in '{}', rolling default die", input);
        return Ok((default_expr()?, input.to_string()));
    }
    match DiceExpression::parse(first_word, default_sides) {
        Err(e) => Err(e),
        // the word parses alone but something glued onto it did not
        Ok(_) => Err(DiceError::Unexpected {
            found: input.chars().nth(first_word.chars().count()).unwrap_or(' '),
            position: first_word.len(),
        }),
    }
}

impl SpecialDice for ArithmeticRoll {
    fn feature(&self) -> Option<Feature> {
        None
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let sides = rc.ctx.config.default_sides;
        if self.input.chars().count() > MAX_INPUT_CHARS {
            let preview: String = self.input.trim().chars().take(16).collect();
            self.state = State::Failed {
                expression: format!("{}…", preview),
                message: format!("longer than {} characters", MAX_INPUT_CHARS),
            };
            return Ok(());
        }
        let (times, body) = match REPEAT_RE.captures(&self.input) {
            Some(caps) => {
                let times = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0);
                let body = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
                (times, body)
            }
            None => (1, self.input.clone()),
        };
        if times == 0 || times > MAX_REPEAT {
            self.state = State::Failed {
                expression: self.input.clone(),
                message: format!("repeat count must be 1-{}", MAX_REPEAT),
            };
            return Ok(());
        }

        let (expr, description) = match split_expression(&body, sides) {
            Ok(parts) => parts,
            Err(e) => {
                self.state = State::Failed {
                    expression: body.trim().to_string(),
                    message: e.to_string(),
                };
                return Ok(());
            }
        };

        let mut outcomes = Vec::with_capacity(times as usize);
        for _ in 0..times {
            match expr.roll(rc.random) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    self.state = State::Failed {
                        expression: expr.source().to_string(),
                        message: e.to_string(),
                    };
                    return Ok(());
                }
            }
        }
        self.state = State::Rolled {
            description,
            outcomes,
        };
        Ok(())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        match &self.state {
            State::Pending => Ok(Rendered::default()),
            State::Failed { expression, message } => {
                let text = rc.builtin(
                    CustomTextKey::RollError,
                    json!({"expression": expression, "errorMessage": message}),
                )?;
                Ok(Rendered::public(text))
            }
            State::Rolled {
                description,
                outcomes,
            } => {
                let rolls: Vec<Value> = outcomes
                    .iter()
                    .map(|o| {
                        json!({
                            "text": o.to_string(),
                            "expression": o.expression,
                            "detail": o.detail,
                            "total": o.total,
                        })
                    })
                    .collect();
                let first = outcomes.first();
                let vars = json!({
                    "description": description,
                    "expression": first.map(|o| o.expression.clone()).unwrap_or_default(),
                    "detail": first.map(|o| o.detail.clone()).unwrap_or_default(),
                    "result": first.map(|o| o.total).unwrap_or_default(),
                    "rolls": rolls,
                });
                let result = rc.builtin(CustomTextKey::RollResult, vars)?;
                if self.hidden {
                    let public = rc.builtin(CustomTextKey::RollHidden, json!({"description": description}))?;
                    Ok(Rendered {
                        public,
                        private: Some(result),
                    })
                } else {
                    Ok(Rendered::public(result))
                }
            }
        }
    }
}
