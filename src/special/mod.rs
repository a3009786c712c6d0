//! Built-in special dice.
//!
//! Each variant implements [`SpecialDice`](crate::engine::SpecialDice) and is
//! created per command by the trigger table below:
//!
//! - `nn` card linking
//! - `vs` opposed rolls
//! - `ds` death saves
//! - `en` skill growth
//! - `ri` initiative
//! - `sc` sanity checks
//! - `st` card entries
//! - `r`/`rh` and anything unmatched: the arithmetic roll

pub mod ds;
pub mod en;
pub mod nn;
pub mod ri;
pub mod roll;
pub mod sc;
pub mod st;
pub mod vs;

pub use roll::ArithmeticRoll;

use log::error;

use crate::bot::roles::Feature;
use crate::engine::{CommandSpec, SpecialDice, Trigger, TriggerMatch};

fn regex(pattern: &str) -> Option<Trigger> {
    match Trigger::regex(pattern) {
        Ok(t) => Some(t),
        Err(e) => {
            error!("built-in trigger '{}' does not compile: {}", pattern, e);
            None
        }
    }
}

fn boxed<T: SpecialDice + 'static>(dice: T) -> Box<dyn SpecialDice> {
    Box::new(dice)
}

/// The built-in trigger table, in matching order for regex rows.
pub fn builtin_commands() -> Vec<CommandSpec> {
    let mut specs = vec![
        CommandSpec::new("nn", Trigger::exact(["nn"]), Some(Feature::Nn), |_, _| {
            boxed(nn::ShowLink::new())
        }),
        CommandSpec::new(
            "nn clear",
            Trigger::exact(["nn clear", "nn clr", "nn del"]),
            Some(Feature::Nn),
            |_, _| boxed(nn::ClearLink::new()),
        ),
        CommandSpec::new(
            "ri list",
            Trigger::exact(["ri list", "init"]),
            Some(Feature::Ri),
            |_, _| boxed(ri::InitiativeList::new()),
        ),
        CommandSpec::new(
            "ri clear",
            Trigger::exact(["ri clear", "ri clr", "init clr", "init clear"]),
            Some(Feature::Ri),
            |_, _| boxed(ri::InitiativeClear),
        ),
        CommandSpec::new("st show", Trigger::exact(["st show"]), Some(Feature::St), |_, _| {
            boxed(st::StatShow::new(""))
        }),
        CommandSpec::new("ds", Trigger::exact(["ds"]), Some(Feature::Ds), |_, _| {
            boxed(ds::DeathSave::new())
        }),
        CommandSpec::new("en", Trigger::exact(["en"]), Some(Feature::En), |_, _| {
            boxed(en::Growth::new(""))
        }),
    ];

    type Factory = fn(&TriggerMatch) -> Box<dyn SpecialDice>;
    let patterns: [(&str, &str, Option<Feature>, Factory); 10] = [
        ("nn", r"^nn\s+(?P<body>.+)$", Some(Feature::Nn), |m| {
            boxed(nn::LinkByKeyword::new(m.body.clone()))
        }),
        ("st show", r"^st\s+show\s+(?P<body>.+)$", Some(Feature::St), |m| {
            boxed(st::StatShow::new(&m.body))
        }),
        ("st", r"^st\s+(?P<body>.+)$", Some(Feature::St), |m| {
            boxed(st::StatSet::new(m.body.clone()))
        }),
        ("vs", r"^vs\s+(?P<body>.+)$", Some(Feature::Vs), |m| {
            boxed(vs::Versus::new(m.body.clone()))
        }),
        ("sc", r"^sc\s*(?P<body>.+)$", Some(Feature::Sc), |m| {
            boxed(sc::SanityCheck::new(m.body.clone()))
        }),
        ("ri", r"^ri(?P<body>(?:\s|[+\-=]).*)?$", Some(Feature::Ri), |m| {
            boxed(ri::InitiativeRoll::new(m.body.clone()))
        }),
        ("en mark", r"^en\s+mark\s+(?P<body>.+)$", Some(Feature::En), |m| {
            boxed(en::GrowthMark::new(&m.body))
        }),
        ("en", r"^en\s+(?P<body>.+)$", Some(Feature::En), |m| {
            boxed(en::Growth::new(&m.body))
        }),
        ("rh", r"^rh(?P<body>[\s\d(+\-#dD%].*)?$", None, |m| {
            boxed(ArithmeticRoll::new(m.body.clone(), true))
        }),
        ("r", r"^r(?P<body>[\s\d(+\-#dD%].*)?$", None, |m| {
            boxed(ArithmeticRoll::new(m.body.clone(), false))
        }),
    ];
    for (name, pattern, feature, factory) in patterns {
        if let Some(trigger) = regex(pattern) {
            specs.push(CommandSpec::new(name, trigger, feature, move |m, _| factory(m)));
        }
    }
    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_pattern_compiles() {
        let specs = builtin_commands();
        assert_eq!(specs.len(), 17);
        assert!(specs.iter().all(|s| !s.name.is_empty()));
    }

    #[test]
    fn exact_rows_come_first() {
        let specs = builtin_commands();
        let first_regex = specs
            .iter()
            .position(|s| matches!(s.trigger, Trigger::Regex(_)))
            .unwrap();
        assert!(specs[..first_regex]
            .iter()
            .all(|s| matches!(s.trigger, Trigger::Exact(_))));
        assert!(specs[first_regex..]
            .iter()
            .all(|s| matches!(s.trigger, Trigger::Regex(_))));
    }
}
