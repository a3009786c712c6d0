//! `ds`: D&D death saving throw for the linked card.

use serde_json::json;

use crate::bot::roles::Feature;
use crate::card::Card;
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::text::CustomTextKey;

pub const SUCCESS_KEY: &str = "death save success";
pub const FAILURE_KEY: &str = "death save failure";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeathSaveResult {
    pub roll: u32,
    pub success: bool,
    pub successes: i64,
    pub failures: i64,
    pub stable: bool,
    pub dead: bool,
    pub revived: bool,
}

impl DeathSaveResult {
    pub fn ended(&self) -> bool {
        self.stable || self.dead || self.revived
    }
}

/// Apply one d20 to the running counters.
///
/// 20 revives, 1 counts as two failures, 10+ succeeds. Three of either ends
/// the sequence; counters are reset whenever it ends.
pub fn advance(roll: u32, successes: i64, failures: i64) -> DeathSaveResult {
    let mut r = DeathSaveResult {
        roll,
        successes,
        failures,
        ..Default::default()
    };
    match roll {
        20 => {
            r.success = true;
            r.revived = true;
        }
        1 => r.failures += 2,
        n if n >= 10 => {
            r.success = true;
            r.successes += 1;
        }
        _ => r.failures += 1,
    }
    if !r.revived {
        r.stable = r.successes >= 3;
        r.dead = !r.stable && r.failures >= 3;
    }
    r.successes = r.successes.min(3);
    r.failures = r.failures.min(3);
    r
}

fn write_counters(card: &mut Card, result: &DeathSaveResult) {
    if result.ended() {
        card.remove_entry(SUCCESS_KEY);
        card.remove_entry(FAILURE_KEY);
    } else {
        card.set_entry(SUCCESS_KEY, result.successes, true);
        card.set_entry(FAILURE_KEY, result.failures, true);
    }
    if result.revived && card.get_entry("hp").is_some() {
        card.set_entry("hp", 1, false);
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeathSave {
    card: Option<String>,
    roll: u32,
    result: Option<DeathSaveResult>,
}

impl DeathSave {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecialDice for DeathSave {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Ds)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.card = rc
            .services
            .cards
            .linked_card(&rc.ctx.channel_id, &rc.ctx.user_id)?;
        if self.card.is_some() {
            self.roll = rc.random.roll_die(20);
        }
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        self.card.is_some()
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let Some(name) = &self.card else {
            return Ok(Vec::new());
        };
        let roll = self.roll;
        let mut result = None;
        ac.services.cards.update_card(name, &mut |card: &mut Card| {
            let successes = card.value(SUCCESS_KEY).unwrap_or(0);
            let failures = card.value(FAILURE_KEY).unwrap_or(0);
            let r = advance(roll, successes, failures);
            write_counters(card, &r);
            result = Some(r);
        })?;
        self.result = result;
        Ok(vec![name.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let (Some(name), Some(r)) = (&self.card, &self.result) else {
            return Ok(Rendered::public(rc.builtin(CustomTextKey::CardEmpty, json!({}))?));
        };
        let key = if r.ended() {
            CustomTextKey::DsEnd
        } else {
            CustomTextKey::DsResult
        };
        let text = rc.builtin(
            key,
            json!({
                "cardName": name,
                "roll": r.roll,
                "success": r.success,
                "successes": r.successes,
                "failures": r.failures,
                "stable": r.stable,
                "dead": r.dead,
                "revived": r.revived,
            }),
        )?;
        Ok(Rendered::public(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_one_counts_twice() {
        let r = advance(1, 0, 0);
        assert_eq!(r.failures, 2);
        assert!(!r.ended());
        let r = advance(1, 0, 2);
        assert!(r.dead);
    }

    #[test]
    fn third_success_stabilizes() {
        let r = advance(12, 2, 1);
        assert!(r.success && r.stable && !r.dead);
    }

    #[test]
    fn natural_twenty_revives() {
        let r = advance(20, 0, 2);
        assert!(r.revived && r.ended());
        let mut card = Card::new("Bob", crate::card::CardType::Dnd).with_entry("hp", 0);
        card.set_entry(FAILURE_KEY, 2, true);
        write_counters(&mut card, &r);
        assert_eq!(card.value("hp"), Some(1));
        assert_eq!(card.value(FAILURE_KEY), None);
    }
}
