//! Configuration loading, environment expansion, and serialization
//! round-trips through the YAML surface.

use logfan::{Config, ConfigError, Severity};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn loads_a_full_yaml_config() -> anyhow::Result<()> {
    let file = write_config(
        r#"
console:
  enabled: true
  level: WARNING

file:
  enabled: true
  level: DEBUG
  filename: test.log
  max_size: 2048
  backup_count: 2

push:
  enabled: true
  level: ERROR
  targets:
    - name: oncall
      user_key: u-1
      api_token: t-1
      priority: 2
"#,
    );

    let config = Config::load(file.path())?;

    assert_eq!(config.console.level, Severity::Warning);
    assert!(config.file.enabled);
    assert_eq!(config.file.max_size, 2048);
    assert_eq!(config.push.targets.len(), 1);
    assert_eq!(config.push.targets[0].name, "oncall");
    assert_eq!(config.push.targets[0].priority, 2);
    // Sections absent from the file keep their defaults.
    assert_eq!(config.mail.smtp_port, 587);
    assert_eq!(config.chat.level, Severity::Error);
    Ok(())
}

#[test]
fn missing_file_is_a_read_error() {
    let err = Config::load("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn malformed_yaml_is_rejected() {
    let file = write_config("console: [not: a: mapping");
    let err = Config::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Yaml(_)));
}

#[test]
fn destinations_wrapper_nesting_loads_identically() {
    let flat = write_config("console:\n  level: ERROR\n");
    let nested = write_config("destinations:\n  console:\n    level: ERROR\n");

    let flat = Config::load(flat.path()).unwrap();
    let nested = Config::load(nested.path()).unwrap();

    assert_eq!(flat, nested);
    assert_eq!(flat.console.level, Severity::Error);
}

#[test]
#[serial]
fn env_placeholders_expand_at_load_time() {
    std::env::set_var("LOGFAN_TEST_TOKEN", "secret-token");
    let file = write_config(
        r#"
chat:
  enabled: true
  bot_token: "${LOGFAN_TEST_TOKEN}"
  chat_id: "room-${LOGFAN_TEST_TOKEN}"
"#,
    );

    let config = Config::load(file.path()).unwrap();
    std::env::remove_var("LOGFAN_TEST_TOKEN");

    assert_eq!(config.chat.bot_token, "secret-token");
    // Placeholders expand inside larger strings too.
    assert_eq!(config.chat.chat_id, "room-secret-token");
}

#[test]
#[serial]
fn unresolved_placeholders_pass_through_literally() {
    std::env::remove_var("LOGFAN_TEST_UNSET");
    let file = write_config(
        r#"
chat:
  bot_token: "${LOGFAN_TEST_UNSET}"
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.chat.bot_token, "${LOGFAN_TEST_UNSET}");
}

#[test]
#[serial]
fn env_expansion_recurses_into_sequences() {
    std::env::set_var("LOGFAN_TEST_OPS", "ops@example.com");
    let file = write_config(
        r#"
mail:
  to:
    - "${LOGFAN_TEST_OPS}"
    - second@example.com
"#,
    );

    let config = Config::load(file.path()).unwrap();
    std::env::remove_var("LOGFAN_TEST_OPS");

    assert_eq!(
        config.mail.to,
        vec!["ops@example.com".to_string(), "second@example.com".to_string()]
    );
}

#[test]
fn serialize_load_serialize_is_a_fixpoint() {
    let file = write_config(
        r#"
console:
  level: error
file:
  enabled: true
  filename: fix.log
"#,
    );

    let once = Config::load(file.path()).unwrap();
    let twice = Config::from_value(once.to_value()).unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.to_value(), twice.to_value());
    // Severity names normalize to canonical upper case in the output.
    assert_eq!(once.to_value()["console"]["level"], "ERROR");
}

#[test]
fn save_and_reload_round_trips() -> anyhow::Result<()> {
    let source = write_config(
        r#"
file:
  enabled: true
  filename: saved.log
  max_size: 4096
mail:
  subject_prefix: "[OPS]"
"#,
    );
    let config = Config::load(source.path())?;

    let saved = NamedTempFile::new()?;
    config.save(saved.path())?;
    let reloaded = Config::load(saved.path())?;

    assert_eq!(config, reloaded);
    assert_eq!(reloaded.file.max_size, 4096);
    assert_eq!(reloaded.mail.subject_prefix, "[OPS]");
    Ok(())
}
