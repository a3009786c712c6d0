//! `nn` card linking: show, search-and-link, clear.

use log::debug;
use serde_json::json;

use crate::bot::roles::Feature;
use crate::card::CardQuery;
use crate::engine::{ApplyContext, EngineError, RenderContext, Rendered, RollContext, SpecialDice};
use crate::logutil::escape_log;
use crate::text::CustomTextKey;

/// `nn <keyword>`: link the single matching card.
#[derive(Debug, Clone)]
pub struct LinkByKeyword {
    keyword: String,
    candidates: Vec<String>,
}

impl LinkByKeyword {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            candidates: Vec::new(),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl SpecialDice for LinkByKeyword {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Nn)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        let query = CardQuery {
            name: Some(self.keyword.clone()),
            card_type: rc.ctx.config.card_type,
            is_template: Some(false),
        };
        let mut names: Vec<String> = rc
            .services
            .cards
            .query_card(&query)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        let wanted = self.keyword.to_lowercase();
        if let Some(exact) = names.iter().find(|n| n.to_lowercase() == wanted) {
            names = vec![exact.clone()];
        }
        debug!("nn '{}': {} candidates", escape_log(&self.keyword), names.len());
        self.candidates = names;
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        self.candidates.len() == 1
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        let Some(name) = self.candidates.first() else {
            return Ok(Vec::new());
        };
        ac.services
            .cards
            .link_card(Some(name), &ac.ctx.channel_id, &ac.ctx.user_id)?;
        Ok(vec![name.clone()])
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let text = match self.candidates.as_slice() {
            [only] => rc.builtin(CustomTextKey::NnLink, json!({"cardName": only}))?,
            many => {
                let cards: Vec<_> = many
                    .iter()
                    .enumerate()
                    .map(|(i, name)| json!({"name": name, "last": i + 1 == many.len()}))
                    .collect();
                rc.builtin(
                    CustomTextKey::NnSearch,
                    json!({"keyword": self.keyword, "cards": cards}),
                )?
            }
        };
        Ok(Rendered::public(text))
    }
}

/// `nn`: show the current link.
#[derive(Debug, Clone, Default)]
pub struct ShowLink {
    linked: Option<String>,
}

impl ShowLink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecialDice for ShowLink {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Nn)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.linked = rc
            .services
            .cards
            .linked_card(&rc.ctx.channel_id, &rc.ctx.user_id)?;
        Ok(())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let name = self.linked.clone().unwrap_or_default();
        Ok(Rendered::public(
            rc.builtin(CustomTextKey::NnShow, json!({"cardName": name}))?,
        ))
    }
}

/// `nn clear`: drop the link, reporting which card it pointed at.
#[derive(Debug, Clone, Default)]
pub struct ClearLink {
    previous: Option<String>,
}

impl ClearLink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpecialDice for ClearLink {
    fn feature(&self) -> Option<Feature> {
        Some(Feature::Nn)
    }

    fn roll(&mut self, rc: &mut RollContext<'_>) -> Result<(), EngineError> {
        self.previous = rc
            .services
            .cards
            .linked_card(&rc.ctx.channel_id, &rc.ctx.user_id)?;
        Ok(())
    }

    fn writes(&self) -> bool {
        true
    }

    fn wants_mutation(&self) -> bool {
        true
    }

    fn apply_to_card(&mut self, ac: &ApplyContext<'_>) -> Result<Vec<String>, EngineError> {
        ac.services
            .cards
            .link_card(None, &ac.ctx.channel_id, &ac.ctx.user_id)?;
        Ok(self.previous.iter().cloned().collect())
    }

    fn render(&mut self, rc: &mut RenderContext<'_>) -> Result<Rendered, EngineError> {
        let name = self.previous.clone().unwrap_or_default();
        Ok(Rendered::public(
            rc.builtin(CustomTextKey::NnClear, json!({"cardName": name}))?,
        ))
    }
}
