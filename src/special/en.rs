//! `en`: skill growth checks, and `en mark` to queue skills for the next `en`.

use serde_json::{json, Value};

use crate::bot::roles::Feature;
use crate::card::{normalize_key, Card};
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

const MARK_SUFFIX: &str = ".mark";

pub fn mark_key(skill: &str) -> String {
    format!("{}{}", normalize_key(skill), MARK_SUFFIX)
}

/// Skills currently marked on `card`, in key order.
pub fn marked_skills(card: &Card) -> Vec<String> {
    card.entries
        .iter()
        .filter(|(k, e)| e.is_temp && k.ends_with(MARK_SUFFIX))
        .map(|(k, _)| k.trim_end_matches(MARK_SUFFIX).to_string())
        .collect()
}

fn split_skills(args: &str) -> Vec<String> {
    args.split(|c: char| c.is_whitespace() || c == ',' || c == '，')
        .filter(|s| !s.is_empty())
        .map(normalize_key)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthCheck {
    pub skill: String,
    pub before: Option<i64>,
    pub roll: u32,
    pub gain: i64,
}

impl GrowthCheck {
    /// A check succeeds when the d100 beats the current value or lands above 95.
    pub fn success(&self) -> bool {
        match self.before {
            Some(before) => i64::from(self.roll) > before || self.roll > 95,
            None => false,
        }
    }

    fn to_json(&self) -> Value {
        let before = self.before.unwrap_or_default();
        json!({
            "skill": self.skill,
            "missing": self.before.is_none(),
            "before": before,
            "roll": self.roll,
            "success": self.success(),
            "gain": self.gain,
            "after": before + self.gain,
        })
    }
}

/// `en` / `en <skills>`
#[derive(Debug, Clone)]
pub struct Growth {
    explicit: Vec<String>,
    card: Option<String>,
    checks: Vec<GrowthCheck>,
}

impl Growth {
    pub fn new(args: &str) -> Self {
        Self {
            explicit: split_skills(args),
            card: None,
            checks: Vec::new(),
        }
    }
}

impl SpecialDice for Growth {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::En)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let Some(card) = rc.services.linked_card(rc.ctx)? else {
            return Ok(());
        };
        let skills = if self.explicit.is_empty() {
            marked_skills(&card)
        } else {
            self.explicit.clone()
        };
        for skill in skills {
            let before = card.value(&skill);
            let roll = rc.random.roll_die(100);
            let mut check = GrowthCheck {
                skill,
                before,
                roll,
                gain: 0,
            };
            if check.success() {
                check.gain = i64::from(rc.random.roll_die(10));
            }
            self.checks.push(check);
        }
        self.card = Some(card.name);
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        self.card.is_some() && !self.checks.is_empty()
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let Some(name) = &self.card else {
            return Ok(Vec::new());
        };
        let checks = &mut self.checks;
        ac.services.cards.update_card(name, &mut |card: &mut Card| {
            for check in checks.iter_mut() {
                card.remove_entry(&mark_key(&check.skill));
                let Some(current) = card.value(&check.skill) else {
                    continue;
                };
                // the card may have moved since roll(); grow from what is stored now
                check.before = Some(current);
                if check.gain > 0 {
                    card.set_entry(&check.skill, current + check.gain, false);
                }
            }
        })?;
        Ok(vec![name.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let Some(name) = &self.card else {
            return Ok(Rendered::public(rc.builtin(CustomTextKey::CardEmpty, json!({}))?));
        };
        if self.checks.is_empty() {
            return Ok(Rendered::public(
                rc.builtin(CustomTextKey::EnEmpty, json!({"cardName": name}))?,
            ));
        }
        let skills: Vec<Value> = self.checks.iter().map(GrowthCheck::to_json).collect();
        Ok(Rendered::public(rc.builtin(
            CustomTextKey::EnResult,
            json!({"cardName": name, "skills": skills}),
        )?))
    }
}

/// `en mark <skills>`
#[derive(Debug, Clone)]
pub struct GrowthMark {
    skills: Vec<String>,
    card: Option<String>,
}

impl GrowthMark {
    pub fn new(args: &str) -> Self {
        Self {
            skills: split_skills(args),
            card: None,
        }
    }
}

impl SpecialDice for GrowthMark {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::En)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.card = rc
            .services
            .cards
            .linked_card(&rc.ctx.channel_id, &rc.ctx.user_id)?;
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        self.card.is_some() && !self.skills.is_empty()
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let Some(name) = &self.card else {
            return Ok(Vec::new());
        };
        let skills = &self.skills;
        ac.services.cards.update_card(name, &mut |card: &mut Card| {
            for skill in skills {
                card.set_entry(&mark_key(skill), 1, true);
            }
        })?;
        Ok(vec![name.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let Some(name) = &self.card else {
            return Ok(Rendered::public(rc.builtin(CustomTextKey::CardEmpty, json!({}))?));
        };
        if self.skills.is_empty() {
            return Ok(Rendered::public(
                rc.builtin(CustomTextKey::EnEmpty, json!({"cardName": name}))?,
            ));
        }
        let skills: Vec<Value> = self.skills.iter().map(|s| json!({"skill": s})).collect();
        Ok(Rendered::public(rc.builtin(
            CustomTextKey::EnMark,
            json!({"cardName": name, "skills": skills}),
        )?))
    }
}
