use super::*;
use std::collections::HashMap;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

fn required() -> Vec<(&'static str, &'static str)> {
    vec![("API_TOKEN", "123:abc"), ("CHANNEL_USERNAME", "@gift_channel")]
}

#[test]
fn defaults_apply_when_only_required_values_are_set() {
    let settings = resolve_settings(None, env_from(&required())).expect("settings");

    assert_eq!(settings.api_token, "123:abc");
    assert_eq!(settings.channel.name(), "gift_channel");
    assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(settings.reward_url, DEFAULT_REWARD_URL);
    assert_eq!(settings.telegram_api_url, DEFAULT_API_URL);
    assert_eq!(settings.poll_timeout, Duration::from_secs(30));
    assert!(settings.operator_chat.is_none());
}

#[test]
fn missing_token_is_fatal() {
    let err = resolve_settings(None, env_from(&[("CHANNEL_USERNAME", "gift_channel")]))
        .expect_err("token required");
    assert!(matches!(err, ConfigError::Missing("API_TOKEN")));

    let blank = resolve_settings(
        None,
        env_from(&[("API_TOKEN", "   "), ("CHANNEL_USERNAME", "gift_channel")]),
    )
    .expect_err("blank token");
    assert!(matches!(blank, ConfigError::Missing("API_TOKEN")));
}

#[test]
fn missing_or_bare_channel_is_fatal() {
    let err = resolve_settings(None, env_from(&[("API_TOKEN", "t")])).expect_err("channel");
    assert!(matches!(err, ConfigError::Missing("CHANNEL_USERNAME")));

    let bare = resolve_settings(
        None,
        env_from(&[("API_TOKEN", "t"), ("CHANNEL_USERNAME", "@")]),
    )
    .expect_err("only an at sign");
    assert!(matches!(bare, ConfigError::Channel(_)));
}

#[test]
fn environment_overrides_settings_file() {
    let file = r#"
        api_token = "from-file"
        channel_username = "file_channel"
        reward_url = "https://example.com/file"
        poll_timeout_secs = 5
        operator_chat_id = -100
    "#;
    let mut vars = vec![("API_TOKEN", "from-env")];
    vars.push(("POLL_TIMEOUT_SECS", "12"));
    let settings = resolve_settings(Some(file), env_from(&vars)).expect("settings");

    assert_eq!(settings.api_token, "from-env");
    assert_eq!(settings.channel.name(), "file_channel");
    assert_eq!(settings.reward_url, "https://example.com/file");
    assert_eq!(settings.poll_timeout, Duration::from_secs(12));
    assert_eq!(settings.operator_chat, Some(ChatId(-100)));
}

#[test]
fn malformed_settings_file_is_reported() {
    let err = resolve_settings(Some("api_token = ["), env_from(&required())).expect_err("toml");
    assert!(matches!(err, ConfigError::File { .. }));
}

#[test]
fn non_numeric_values_are_invalid() {
    let mut vars = required();
    vars.push(("POLL_TIMEOUT_SECS", "soon"));
    let err = resolve_settings(None, env_from(&vars)).expect_err("poll timeout");
    assert!(matches!(
        err,
        ConfigError::Invalid { name: "POLL_TIMEOUT_SECS", .. }
    ));

    let mut vars = required();
    vars.push(("OPERATOR_CHAT_ID", "ops"));
    let err = resolve_settings(None, env_from(&vars)).expect_err("operator chat");
    assert!(matches!(
        err,
        ConfigError::Invalid { name: "OPERATOR_CHAT_ID", .. }
    ));
}

#[test]
fn empty_operator_chat_disables_reports() {
    let file = "operator_chat_id = 42";
    let mut vars = required();
    vars.push(("OPERATOR_CHAT_ID", ""));
    let settings = resolve_settings(Some(file), env_from(&vars)).expect("settings");
    assert!(settings.operator_chat.is_none());
}

#[test]
fn database_urls_are_normalized() {
    assert_eq!(normalize_database_url(""), DEFAULT_DATABASE_URL);
    assert_eq!(normalize_database_url("  "), DEFAULT_DATABASE_URL);
    assert_eq!(
        normalize_database_url("sqlite::memory:"),
        "sqlite::memory:"
    );
    assert_eq!(
        normalize_database_url("sqlite:///var/lib/bot/users.db"),
        "sqlite:///var/lib/bot/users.db"
    );
    assert_eq!(
        normalize_database_url("data/users.db"),
        "sqlite://data/users.db"
    );
    assert_eq!(
        normalize_database_url(r"C:\bot\users.db"),
        "sqlite://C:/bot/users.db"
    );
}

#[test]
fn debug_output_redacts_token() {
    let settings = resolve_settings(None, env_from(&required())).expect("settings");
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains("123:abc"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn poll_timeout_above_bot_api_limit_is_invalid() {
    let mut vars = required();
    vars.push(("POLL_TIMEOUT_SECS", "18446744073709551615"));
    let err = resolve_settings(None, env_from(&vars)).expect_err("huge timeout");
    assert!(matches!(
        err,
        ConfigError::Invalid { name: "POLL_TIMEOUT_SECS", .. }
    ));

    let err = resolve_settings(Some("poll_timeout_secs = 51"), env_from(&required()))
        .expect_err("file value above limit");
    assert!(matches!(
        err,
        ConfigError::Invalid { name: "POLL_TIMEOUT_SECS", .. }
    ));

    let mut vars = required();
    vars.push(("POLL_TIMEOUT_SECS", "50"));
    let settings = resolve_settings(None, env_from(&vars)).expect("limit is accepted");
    assert_eq!(settings.poll_timeout, Duration::from_secs(50));
}

#[test]
fn empty_poll_timeout_falls_back() {
    let mut vars = required();
    vars.push(("POLL_TIMEOUT_SECS", "  "));
    let settings = resolve_settings(None, env_from(&vars)).expect("settings");
    assert_eq!(settings.poll_timeout, Duration::from_secs(30));

    let settings = resolve_settings(Some("poll_timeout_secs = 7"), env_from(&vars))
        .expect("settings");
    assert_eq!(settings.poll_timeout, Duration::from_secs(7));
}
