//! Built-in text table. The `match` is exhaustive over [`CustomTextKey`], so a
//! new key does not compile until it has a default.

use super::keys::CustomTextKey;

/// Built-in template for `key`. One per key, so the default output does not
/// depend on the dice; weighted alternatives belong in channel or plugin tables.
pub fn default_text(key: CustomTextKey) -> &'static str {
    match key {
        CustomTextKey::RollResult => "{{userName}} rolls {{#description}}{{description}}: {{/description}}{{#rolls}}{{text}}{{^last}}; {{/last}}{{/rolls}}",
        CustomTextKey::RollHidden => "{{userName}} rolled in secret{{#description}} ({{description}}){{/description}}.",
        CustomTextKey::RollError => "{{userName}}, I can't read \"{{expression}}\": {{errorMessage}}.",
        CustomTextKey::CardEmpty => "{{userName}} has no linked card. Use nn <name> to pick one.",
        CustomTextKey::CardNoPermission => "{{userName}} is not allowed to change cards here.",
        CustomTextKey::NnShow => "{{#cardName}}{{userName}} is playing {{cardName}}.{{/cardName}}{{^cardName}}{{userName}} has no linked card.{{/cardName}}",
        CustomTextKey::NnLink => "{{userName}} is now playing {{cardName}}.",
        CustomTextKey::NnSearch => "{{^cards}}No card matches \"{{keyword}}\".{{/cards}}{{#cards.length}}Several cards match \"{{keyword}}\": {{/cards.length}}{{#cards}}{{name}}{{^last}}, {{/last}}{{/cards}}",
        CustomTextKey::NnClear => "{{#cardName}}{{userName}} stopped playing {{cardName}}.{{/cardName}}{{^cardName}}{{userName}} had no linked card.{{/cardName}}",
        CustomTextKey::VsResult => "{{userName}} {{skill}} {{roll}}/{{skillValue}} {{level}} vs {{opponentRoll}}/{{opponentValue}} {{opponentLevel}}: {{#win}}win!{{/win}}{{#lose}}lose.{{/lose}}{{#draw}}draw.{{/draw}}",
        CustomTextKey::DsResult => "{{cardName}} death save: {{roll}}, {{#success}}success{{/success}}{{^success}}failure{{/success}}. Successes {{successes}}/3, failures {{failures}}/3.",
        CustomTextKey::DsEnd => "{{cardName}} death save: {{roll}}. {{#revived}}Natural 20, {{cardName}} is back on their feet.{{/revived}}{{#stable}}{{cardName}} is stable.{{/stable}}{{#dead}}{{cardName}} has died.{{/dead}}",
        CustomTextKey::EnResult => "{{cardName}} growth: {{#skills}}{{skill}} {{#missing}}not on card{{/missing}}{{^missing}}{{roll}}/{{before}} {{#success}}+{{gain}} = {{after}}{{/success}}{{^success}}no change{{/success}}{{/missing}}{{^last}}; {{/last}}{{/skills}}",
        CustomTextKey::EnMark => "{{cardName}} marked for growth: {{#skills}}{{skill}}{{^last}}, {{/last}}{{/skills}}.",
        CustomTextKey::EnEmpty => "{{cardName}} has no skills marked for growth.",
        CustomTextKey::RiSet => "{{name}} initiative {{detail}} = {{value}}.\n{{#list}}{{rank}}. {{name}} {{value}}{{^last}}\n{{/last}}{{/list}}",
        CustomTextKey::RiList => "{{^list}}The initiative list is empty.{{/list}}{{#list}}{{rank}}. {{name}} {{value}}{{^last}}\n{{/last}}{{/list}}",
        CustomTextKey::RiClear => "Initiative list cleared.",
        CustomTextKey::ScResult => "{{cardName}} sanity check {{roll}}/{{sanity}} {{level}}, loses {{lossDetail}} = {{loss}}. SAN {{sanity}} -> {{newSanity}}.",
        CustomTextKey::ScExtra => "{{#insane}}SAN reached 0: {{cardName}} is permanently insane.{{/insane}}{{^insane}}{{#temporary}}{{cardName}} lost {{loss}} at once, roll INT for temporary insanity.{{/temporary}}{{/insane}}",
        CustomTextKey::StShow => "{{cardName}}: {{^entries}}nothing to show.{{/entries}}{{#entries}}{{key}} {{value}}{{^last}}, {{/last}}{{/entries}}",
        CustomTextKey::StSet => "{{cardName}} updated: {{#changes}}{{key}} {{before}} -> {{after}}{{^last}}, {{/last}}{{/changes}}",
    }
}
