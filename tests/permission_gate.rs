mod common;

use rolldeck::bot::roles::{WritePolicy, LEVEL_MANAGER, LEVEL_OWNER};
use rolldeck::card::CardStore;
use rolldeck::config::{ChannelSettings, FeatureSettings};

use common::{context_with, dispatcher, run, store};

fn policy(feature: &str, writable: WritePolicy) -> ChannelSettings {
    let mut settings = ChannelSettings::default();
    settings.features.insert(
        feature.to_string(),
        FeatureSettings {
            enabled: true,
            writable,
        },
    );
    settings
}

#[test]
fn linked_policy_needs_an_existing_link() {
    let store = store();
    let d = dispatcher(store.clone());
    let settings = policy("nn", WritePolicy::Linked);

    let (text, mutated) = run(&d, context_with("table", "u1", "Kim", settings.clone()), "nn Alice", &[]);
    assert_eq!(text, "Kim is not allowed to change cards here.");
    assert!(mutated.is_empty());
    assert_eq!(store.linked_card("table", "u1").unwrap(), None);

    // someone already playing may switch
    let ctx = context_with("table", "u1", "Kim", settings).with_linked_card(Some("Bob".into()));
    let (text, mutated) = run(&d, ctx, "nn Alice", &[]);
    assert_eq!(text, "Kim is now playing Alice.");
    assert_eq!(mutated, vec!["Alice".to_string()]);
}

#[test]
fn manager_policy_accepts_managers_and_direct_messages() {
    let store = store();
    store.link_card(Some("Alice"), "table", "u1").unwrap();
    let d = dispatcher(store.clone());
    let settings = policy("st", WritePolicy::Manager);

    let member = context_with("table", "u1", "Kim", settings.clone());
    let (text, _) = run(&d, member.clone(), "st hp-1", &[]);
    assert_eq!(text, "Kim is not allowed to change cards here.");
    assert_eq!(store.get_card("Alice").unwrap().unwrap().value("hp"), Some(11));

    let mut manager = member.clone();
    manager.user_level = LEVEL_MANAGER;
    let (text, mutated) = run(&d, manager, "st hp-1", &[]);
    assert_eq!(text, "Alice updated: hp 11 -> 10");
    assert_eq!(mutated, vec!["Alice".to_string()]);

    let mut direct = member;
    direct.is_direct = true;
    let (text, _) = run(&d, direct, "st hp-1", &[]);
    assert_eq!(text, "Alice updated: hp 10 -> 9");
}

#[test]
fn none_policy_denies_owners_too() {
    let store = store();
    store.link_card(Some("Alice"), "table", "u1").unwrap();
    let d = dispatcher(store.clone());
    let mut owner = context_with("table", "u1", "Kim", policy("sc", WritePolicy::None));
    owner.user_level = LEVEL_OWNER;

    let (text, mutated) = run(&d, owner, "sc 1/1d6", &[80, 4]);
    assert_eq!(text, "Kim is not allowed to change cards here.");
    assert!(mutated.is_empty());
    assert_eq!(store.get_card("Alice").unwrap().unwrap().value("sanity"), Some(60));
}

#[test]
fn every_writing_command_is_refused_the_same_way() {
    let cases = [
        ("nn", "nn Ali"),
        ("nn", "nn zzz"),
        ("nn", "nn Alice"),
        ("nn", "nn clear"),
        ("ds", "ds"),
        ("en", "en"),
        ("en", "en spot"),
        ("en", "en mark spot"),
        ("sc", "sc 1/1d6"),
        ("sc", "sc 0/1d4 50"),
        ("st", "st hp5"),
        ("st", "st nonsense"),
        ("ri", "ri +2"),
        ("ri", "ri clear"),
    ];
    for (feature, raw) in cases {
        let store = store();
        store.link_card(Some("Alice"), "table", "u1").unwrap();
        let d = dispatcher(store.clone());
        let mut owner = context_with("table", "u1", "Kim", policy(feature, WritePolicy::None))
            .with_linked_card(Some("Alice".into()));
        owner.user_level = LEVEL_OWNER;

        let (text, mutated) = run(&d, owner, raw, &[1, 1, 1]);
        assert_eq!(text, "Kim is not allowed to change cards here.", "{}", raw);
        assert!(mutated.is_empty(), "{}", raw);
        assert_eq!(store.linked_card("table", "u1").unwrap().as_deref(), Some("Alice"), "{}", raw);
        let alice = store.get_card("Alice").unwrap().unwrap();
        assert_eq!(alice.value("sanity"), Some(60), "{}", raw);
        assert_eq!(alice.value("hp"), Some(11), "{}", raw);
        assert!(alice.get_entry("spot.mark").is_none(), "{}", raw);
    }
}

#[test]
fn linked_policy_refuses_before_looking_for_a_card() {
    for (feature, raw) in [("ds", "ds"), ("en", "en"), ("sc", "sc 1/1d6"), ("st", "st hp-1")] {
        let d = dispatcher(store());
        let ctx = context_with("table", "u1", "Kim", policy(feature, WritePolicy::Linked));
        let (text, mutated) = run(&d, ctx, raw, &[]);
        assert_eq!(text, "Kim is not allowed to change cards here.", "{}", raw);
        assert!(mutated.is_empty());
    }
}

#[test]
fn reads_are_never_gated() {
    let store = store();
    store.link_card(Some("Alice"), "table", "u1").unwrap();
    let d = dispatcher(store);
    let ctx = context_with("table", "u1", "Kim", policy("st", WritePolicy::None))
        .with_linked_card(Some("Alice".into()));
    let (text, _) = run(&d, ctx, "st show hp", &[]);
    assert_eq!(text, "Alice: hp 11");

    let ctx = context_with("table", "u1", "Kim", policy("nn", WritePolicy::None));
    let (text, _) = run(&d, ctx, "nn", &[]);
    assert_eq!(text, "Kim is playing Alice.");

    let ctx = context_with("table", "u1", "Kim", policy("ri", WritePolicy::None));
    let (text, _) = run(&d, ctx, "ri list", &[]);
    assert_eq!(text, "The initiative list is empty.");
}
