use rolldeck::bot::roles::{Feature, WritePolicy};
use rolldeck::card::CardType;
use rolldeck::config::Config;
use rolldeck::text::CustomTextEntry;
use tempfile::TempDir;

#[tokio::test]
async fn default_file_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();
    Config::create_default(path).await.unwrap();

    let config = Config::load(path).await.unwrap();
    assert_eq!(config.bot.id, "rolldeck");
    assert_eq!(config.bot.command_prefixes, vec![".".to_string(), "。".to_string()]);
    assert!(config.validate().is_empty());

    let settings = config.channel_settings("anywhere");
    assert_eq!(settings.default_sides, 100);
    for feature in [Feature::Ds, Feature::En, Feature::Sc, Feature::St] {
        assert_eq!(settings.write_policy(&feature), WritePolicy::Linked, "{}", feature);
    }
    assert_eq!(settings.write_policy(&Feature::Nn), WritePolicy::All);
    assert!(settings.feature_enabled(&Feature::Ri));
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = tokio_test::block_on(Config::load(path.to_str().unwrap())).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[tokio::test]
async fn channel_layers_and_plugin_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        r#"
[bot]
id = "table-bot"
name = "Table Bot"
command_prefixes = ["!"]
owners = ["gm"]

[logging]
level = "debug"

[storage]
data_dir = "/tmp/rolldeck-test"
cards_file = "party.json"

[defaults]
default_dice = 20
card_type = "dnd"

[defaults.special_dice.sc]
enabled = false

[channels."coc-night"]
default_dice = 100
card_type = "coc"

[channels."coc-night".special_dice.sc]
enabled = true
writable = "manager"

[[channels."coc-night".texts."sc.result"]]
weight = 2.0
text = "{{cardName}}: {{newSanity}}"

[[channels."coc-night".texts."sc.result"]]
weight = 1.0
text = "{{cardName}} shivers"

[plugins.karma]
start = 3
"#,
    )
    .await
    .unwrap();

    let config = Config::load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(config.bot.platform, "cli");
    assert_eq!(config.logging.file, None);
    assert_eq!(
        config.storage.cards_path(),
        std::path::Path::new("/tmp/rolldeck-test").join("party.json")
    );
    assert_eq!(
        config.plugins["karma"].get("start").and_then(|v| v.as_integer()),
        Some(3)
    );

    let other = config.channel_settings("elsewhere");
    assert_eq!(other.default_sides, 20);
    assert_eq!(other.card_type, Some(CardType::Dnd));
    assert!(!other.feature_enabled(&Feature::Sc));
    assert!(other.texts.get("sc.result").is_none());

    let night = config.channel_settings("coc-night");
    assert_eq!(night.default_sides, 100);
    assert_eq!(night.card_type, Some(CardType::Coc));
    assert!(night.feature_enabled(&Feature::Sc));
    assert_eq!(night.write_policy(&Feature::Sc), WritePolicy::Manager);
    match night.texts.get("sc.result") {
        Some(CustomTextEntry::Items(items)) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].weight, 2.0);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn validation_lists_problems_without_failing() {
    let config = Config::from_toml_str(
        r#"
[bot]
id = ""
name = "x"
[logging]
level = "info"
[storage]
data_dir = "."
[defaults]
default_dice = 5000
[defaults.special_dice.karma]
enabled = false
[[defaults.texts."nn.lnk"]]
text = "typo"
[[defaults.texts."karma.up"]]
text = "plugin key, not checked"
"#,
    )
    .unwrap();
    let problems = config.validate();
    assert_eq!(problems.len(), 4, "{:?}", problems);
    assert!(problems.iter().any(|p| p.contains("bot.id")));
    assert!(problems.iter().any(|p| p.contains("default_dice 5000")));
    assert!(problems.iter().any(|p| p.contains("nn.lnk")));
    assert!(problems.iter().any(|p| p.contains("special_dice.karma")));

    // out-of-range die sizes are ignored when resolving
    assert_eq!(config.channel_settings("c").default_sides, 100);
}
