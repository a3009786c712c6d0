mod common;

use std::sync::Arc;

use rolldeck::card::{CardStore, MemoryCardStore};
use rolldeck::dice::{RngSource, ScriptedSource};
use rolldeck::engine::{CommandDispatcher, EngineError};

use common::{context, dispatcher, run, store};

fn table_with(card: Option<&str>) -> (Arc<MemoryCardStore>, CommandDispatcher) {
    let store = store();
    if let Some(name) = card {
        store.link_card(Some(name), "table", "u1").unwrap();
    }
    let d = dispatcher(store.clone());
    (store, d)
}

fn kim(d: &CommandDispatcher, raw: &str, dice: &[u32]) -> (String, Vec<String>) {
    run(d, context("table", "u1", "Kim"), raw, dice)
}

fn value(store: &MemoryCardStore, card: &str, key: &str) -> Option<i64> {
    store.get_card(card).unwrap().unwrap().value(key)
}

#[test]
fn sanity_check_on_failure_rolls_the_failure_loss() {
    let (store, d) = table_with(Some("Alice"));
    let (text, mutated) = kim(&d, "sc 1/1d6", &[80, 4]);
    assert_eq!(text, "Alice sanity check 80/60 failure, loses 1d6 = 4. SAN 60 -> 56.");
    assert_eq!(mutated, vec!["Alice".to_string()]);
    assert_eq!(value(&store, "Alice", "sanity"), Some(56));
}

#[test]
fn sanity_check_success_and_detail() {
    let (store, d) = table_with(Some("Alice"));
    let (text, _) = kim(&d, "sc 1d3/1d6", &[10, 2]);
    assert_eq!(text, "Alice sanity check 10/60 extreme success, loses 1d3 = 2. SAN 60 -> 58.");
    let (text, _) = kim(&d, "sc0/1d4+1", &[90, 3]);
    assert_eq!(text, "Alice sanity check 90/58 failure, loses 1d4+1=3+1 = 4. SAN 58 -> 54.");
    assert_eq!(value(&store, "Alice", "sanity"), Some(54));
}

#[test]
fn fumble_takes_the_maximum_loss_and_adds_a_note() {
    let (store, d) = table_with(Some("Alice"));
    let (text, _) = kim(&d, "sc 1/1d6", &[100]);
    assert_eq!(
        text,
        "Alice sanity check 100/60 fumble, loses 1d6 = 6. SAN 60 -> 54.\n\
         Alice lost 6 at once, roll INT for temporary insanity."
    );
    assert_eq!(value(&store, "Alice", "sanity"), Some(54));
}

#[test]
fn sanity_never_drops_below_zero() {
    let store = store();
    store.link_card(Some("Alicia"), "table", "u1").unwrap();
    let d = dispatcher(store.clone());
    let (text, _) = kim(&d, "sc 0/50", &[99]);
    assert_eq!(
        text,
        "Alicia sanity check 99/40 fumble, loses 50 = 50. SAN 40 -> 0.\n\
         SAN reached 0: Alicia is permanently insane."
    );
    assert_eq!(value(&store, "Alicia", "sanity"), Some(0));
}

#[test]
fn explicit_sanity_writes_nothing() {
    let (store, d) = table_with(Some("Alice"));
    let (text, mutated) = kim(&d, "sc 0/1 40", &[50]);
    assert_eq!(text, "Kim sanity check 50/40 failure, loses 1 = 1. SAN 40 -> 39.");
    assert!(mutated.is_empty());
    assert_eq!(value(&store, "Alice", "sanity"), Some(60));
}

#[test]
fn sanity_check_needs_a_card_or_a_value() {
    let (_, d) = table_with(None);
    let (text, _) = kim(&d, "sc 1/1d6", &[]);
    assert_eq!(text, "Kim has no linked card. Use nn <name> to pick one.");
    let (text, _) = kim(&d, "sc 1d6", &[]);
    assert!(text.starts_with("Kim, I can't read \"sc 1d6\": "), "{}", text);
}

#[test]
fn death_saves_count_up_and_revive() {
    let store = store();
    store.link_card(Some("Bob"), "table", "u1").unwrap();
    let d = dispatcher(store.clone());

    let (text, mutated) = kim(&d, "ds", &[5]);
    assert_eq!(text, "Bob death save: 5, failure. Successes 0/3, failures 1/3.");
    assert_eq!(mutated, vec!["Bob".to_string()]);
    let (text, _) = kim(&d, "DS", &[14]);
    assert_eq!(text, "Bob death save: 14, success. Successes 1/3, failures 1/3.");

    let (text, _) = kim(&d, "ds", &[20]);
    assert_eq!(text, "Bob death save: 20. Natural 20, Bob is back on their feet.");
    let bob = store.get_card("Bob").unwrap().unwrap();
    assert_eq!(bob.value("hp"), Some(1));
    assert_eq!(bob.value("death save failure"), None);
    assert_eq!(bob.value("death save success"), None);
}

#[test]
fn death_saves_end_stable_or_dead() {
    let store = store();
    store.link_card(Some("Bob"), "table", "u1").unwrap();
    let d = dispatcher(store.clone());
    kim(&d, "ds", &[12]);
    kim(&d, "ds", &[11]);
    let (text, _) = kim(&d, "ds", &[10]);
    assert_eq!(text, "Bob death save: 10. Bob is stable.");

    let (text, _) = kim(&d, "ds", &[1]);
    assert_eq!(text, "Bob death save: 1, failure. Successes 0/3, failures 2/3.");
    let (text, _) = kim(&d, "ds", &[3]);
    assert_eq!(text, "Bob death save: 3. Bob has died.");
}

#[test]
fn death_save_without_card() {
    let (_, d) = table_with(None);
    let (text, mutated) = kim(&d, "ds", &[20]);
    assert_eq!(text, "Kim has no linked card. Use nn <name> to pick one.");
    assert!(mutated.is_empty());
}

#[test]
fn growth_marks_then_checks() {
    let (store, d) = table_with(Some("Alice"));
    let (text, mutated) = kim(&d, "en mark spot, library", &[]);
    assert_eq!(text, "Alice marked for growth: spot, library.");
    assert_eq!(mutated, vec!["Alice".to_string()]);

    // marks are checked in key order: library, then spot
    let (text, _) = kim(&d, "en", &[90, 7, 30]);
    assert_eq!(text, "Alice growth: library 90/50 +7 = 57; spot 30/45 no change");
    assert_eq!(value(&store, "Alice", "library"), Some(57));
    assert_eq!(value(&store, "Alice", "spot"), Some(45));

    let (text, mutated) = kim(&d, "en", &[]);
    assert_eq!(text, "Alice has no skills marked for growth.");
    assert!(mutated.is_empty());
}

#[test]
fn growth_on_named_skills() {
    let (store, d) = table_with(Some("Alice"));
    let (text, _) = kim(&d, "en spot luck", &[97, 3, 10]);
    assert_eq!(text, "Alice growth: spot 97/45 +3 = 48; luck not on card");
    assert_eq!(value(&store, "Alice", "spot"), Some(48));
    assert_eq!(value(&store, "Alice", "luck"), None);
}

#[test]
fn initiative_list_is_per_channel_and_sorted() {
    let store = store();
    store.link_card(Some("Bob"), "table", "u2").unwrap();
    let d = dispatcher(store.clone());

    let (text, mutated) = kim(&d, "ri +2 Goblin", &[10]);
    assert_eq!(text, "Goblin initiative 10+2 = 12.\n1. Goblin 12");
    assert!(mutated.is_empty());

    // Bob is a D&D card with dex 14: +2
    let (text, _) = run(&d, context("table", "u2", "Lee"), "ri", &[15]);
    assert_eq!(text, "Bob initiative 15+2 = 17.\n1. Bob 17\n2. Goblin 12");

    let (text, _) = kim(&d, "ri=5 Orc", &[]);
    assert_eq!(text, "Orc initiative 5 = 5.\n1. Bob 17\n2. Goblin 12\n3. Orc 5");

    let (text, _) = kim(&d, "ri -1 Goblin", &[4]);
    assert_eq!(text, "Goblin initiative 4-1 = 3.\n1. Bob 17\n2. Orc 5\n3. Goblin 3");

    let (text, _) = run(&d, context("other", "u1", "Kim"), "init", &[]);
    assert_eq!(text, "The initiative list is empty.");
    let (text, _) = kim(&d, "init", &[]);
    assert_eq!(text, "1. Bob 17\n2. Orc 5\n3. Goblin 3");

    let (text, _) = kim(&d, "ri clear", &[]);
    assert_eq!(text, "Initiative list cleared.");
    let (text, _) = kim(&d, "ri list", &[]);
    assert_eq!(text, "The initiative list is empty.");
}

#[test]
fn stat_set_adjusts_and_replaces() {
    let (store, d) = table_with(Some("Alice"));
    let (text, mutated) = kim(&d, "st hp-1d3 spot+5", &[2]);
    assert_eq!(text, "Alice updated: hp 11 -> 9, spot 45 -> 50");
    assert_eq!(mutated, vec!["Alice".to_string()]);

    let (text, _) = kim(&d, "st san:40 luck65", &[]);
    assert_eq!(text, "Alice updated: sanity 60 -> 40, luck 0 -> 65");
    assert_eq!(value(&store, "Alice", "sanity"), Some(40));
    assert_eq!(value(&store, "Alice", "luck"), Some(65));

    let (text, mutated) = kim(&d, "st hp", &[]);
    assert_eq!(text, "Kim, I can't read \"st hp\": cannot read 'hp'.");
    assert!(mutated.is_empty());
}

#[test]
fn stat_set_without_card() {
    let (_, d) = table_with(None);
    let (text, mutated) = kim(&d, "st hp5", &[]);
    assert_eq!(text, "Kim has no linked card. Use nn <name> to pick one.");
    assert!(mutated.is_empty());
}

#[test]
fn opposed_rolls() {
    let (_, d) = table_with(Some("Alice"));
    let (text, mutated) = kim(&d, "vs spot 50", &[10, 60]);
    assert_eq!(text, "Kim spot 10/45 hard success vs 60/50 failure: win!");
    assert!(mutated.is_empty());

    let (text, _) = kim(&d, "vs library 80", &[60, 5]);
    assert_eq!(text, "Kim library 60/50 failure vs 5/80 extreme success: lose.");

    let (text, _) = kim(&d, "vs dodge 60 40", &[70, 90]);
    assert_eq!(text, "Kim dodge 70/60 failure vs 90/40 failure: draw.");
}

#[test]
fn opposed_roll_on_a_missing_skill() {
    let (_, d) = table_with(Some("Alice"));
    let (text, _) = kim(&d, "vs climb 50", &[]);
    assert_eq!(text, "Kim, I can't read \"vs climb 50\": Alice has no 'climb'.");
}

#[test]
fn arithmetic_rolls() {
    let (_, d) = table_with(None);
    let (text, _) = kim(&d, "r 2d6+1 attack", &[3, 4]);
    assert_eq!(text, "Kim rolls attack: 2d6+1 = [3, 4]+1 = 8");

    let (text, _) = kim(&d, "3#1d6", &[2, 5, 6]);
    assert_eq!(text, "Kim rolls 1d6 = 2; 1d6 = 5; 1d6 = 6");

    let (text, _) = kim(&d, "r2#1d6 fire", &[1, 3]);
    assert_eq!(text, "Kim rolls fire: 1d6 = 1; 1d6 = 3");

    let (text, _) = kim(&d, "11#1d6", &[]);
    assert_eq!(text, "Kim, I can't read \"11#1d6\": repeat count must be 1-10.");

    let (text, _) = kim(&d, "r 1d20x", &[]);
    assert!(text.starts_with("Kim, I can't read \"1d20x\": "), "{}", text);
}

#[test]
fn runaway_expressions_are_input_errors() {
    let (_, d) = table_with(None);
    let nested = format!("r {}1{}", "(".repeat(100), ")".repeat(100));
    let (text, _) = kim(&d, &nested, &[]);
    assert!(text.ends_with(": nested more than 64 levels deep."), "{}", text);

    let huge = format!("r {}1{}", "(".repeat(200_000), ")".repeat(200_000));
    let (text, mutated) = kim(&d, &huge, &[]);
    assert_eq!(
        text,
        "Kim, I can't read \"((((((((((((((((…\": longer than 500 characters."
    );
    assert!(mutated.is_empty());
}

#[test]
fn hidden_roll_splits_public_and_private_text() {
    let (_, d) = table_with(None);
    let random = ScriptedSource::new().with_dice([12]);
    let mut cmd = d.dispatch("rh 1d20 stealth", Arc::new(context("table", "u1", "Kim")), Box::new(random));
    cmd.roll().unwrap();
    assert!(cmd.apply_to_card().unwrap().is_empty());
    assert_eq!(cmd.output().unwrap(), "Kim rolled in secret (stealth).");
    assert_eq!(cmd.private_output().unwrap(), Some("Kim rolls stealth: 1d20 = 12"));
}

#[test]
fn lifecycle_order_and_memoized_output() {
    let (_, d) = table_with(None);
    let random = ScriptedSource::new().with_units([0.9, 0.0]);
    let mut cmd = d.dispatch("r 1d0", Arc::new(context("table", "u1", "Kim")), Box::new(random));
    assert!(matches!(cmd.output(), Err(EngineError::Lifecycle { .. })));
    assert!(matches!(cmd.apply_to_card(), Err(EngineError::Lifecycle { .. })));
    cmd.roll().unwrap();
    assert!(matches!(cmd.roll(), Err(EngineError::Lifecycle { .. })));
    assert!(matches!(cmd.output(), Err(EngineError::Lifecycle { .. })));
    cmd.apply_to_card().unwrap();

    let first = cmd.output().unwrap().to_string();
    assert!(first.starts_with("Kim, I can't read \"1d0\": "), "{}", first);
    assert_eq!(cmd.output().unwrap(), first);
}

#[test]
fn same_seed_same_result() {
    let (_, d) = table_with(None);
    let roll = |seed: u64| {
        let mut cmd = d.dispatch(
            "4d6kh3 stats",
            Arc::new(context("table", "u1", "Kim")),
            Box::new(RngSource::seeded(seed)),
        );
        cmd.roll().unwrap();
        cmd.apply_to_card().unwrap();
        cmd.output().unwrap().to_string()
    };
    assert_eq!(roll(2024), roll(2024));
    assert!(roll(2024).starts_with("Kim rolls stats: 4d6kh3 = ["));
}
