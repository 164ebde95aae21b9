//! Configuration management for the dispatcher.
//!
//! This module defines the typed configuration for every destination and
//! the operations the dispatcher needs from it: loading from YAML or a
//! structured map, shallow per-destination merging for partial runtime
//! updates, whole-update validation, and idempotent serialization.
//!
//! Environment-variable placeholders (`${NAME}`) inside string fields are
//! expanded at load time; unresolved placeholders pass through literally.

use crate::core::{DestinationKind, Severity};
use crate::formatting::{DEFAULT_DATE_FORMAT, DEFAULT_MESSAGE_TEMPLATE, DEFAULT_TEMPLATE};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, merging, or validating configuration.
///
/// A configuration error always rejects the whole operation; no partial
/// state is ever applied.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("unknown destination kind `{0}`")]
    UnknownKind(String),
    #[error("invalid configuration structure: {0}")]
    Shape(String),
    #[error("configuration validation failed: {}", .issues.join("; "))]
    Validation { issues: Vec<String> },
}

/// Settings for the console destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub level: Severity,
    pub format: String,
    pub date_format: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: Severity::Info,
            format: DEFAULT_TEMPLATE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Settings for the rotating-file destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub enabled: bool,
    pub level: Severity,
    pub filename: PathBuf,
    /// Rotation threshold in bytes.
    pub max_size: u64,
    /// Number of rotated generations to retain.
    pub backup_count: u32,
    pub format: String,
    pub date_format: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: Severity::Debug,
            filename: PathBuf::from("app.log"),
            max_size: 10 * 1024 * 1024,
            backup_count: 5,
            format: DEFAULT_TEMPLATE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Settings for the chat-bot destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChatConfig {
    pub enabled: bool,
    pub level: Severity,
    pub bot_token: String,
    pub chat_id: String,
    /// Markup mode sent with every message (e.g. "HTML").
    pub parse_mode: String,
    /// Override for the bot API endpoint. When unset the endpoint is
    /// derived from the bot token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub format: String,
    pub date_format: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: Severity::Error,
            bot_token: String::new(),
            chat_id: String::new(),
            parse_mode: "HTML".to_string(),
            api_url: None,
            format: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// One push sub-destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PushTarget {
    pub name: String,
    pub user_key: String,
    pub api_token: String,
    pub priority: i8,
}

/// Settings for the mobile-push destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PushConfig {
    pub enabled: bool,
    pub level: Severity,
    pub targets: Vec<PushTarget>,
    /// Override for the push API endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub format: String,
    pub date_format: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: Severity::Warning,
            targets: Vec::new(),
            api_url: None,
            format: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Settings for the email destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MailConfig {
    pub enabled: bool,
    pub level: Severity,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Upgrade the session to TLS (STARTTLS) before authenticating.
    pub use_tls: bool,
    pub username: String,
    pub password: String,
    #[serde(rename = "from")]
    pub from_addr: String,
    pub to: Vec<String>,
    pub subject_prefix: String,
    pub format: String,
    pub date_format: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: Severity::Critical,
            smtp_host: String::new(),
            smtp_port: 587,
            use_tls: true,
            username: String::new(),
            password: String::new(),
            from_addr: String::new(),
            to: Vec::new(),
            subject_prefix: "[ALERT]".to_string(),
            format: DEFAULT_TEMPLATE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// The validated configuration for a whole dispatcher: one descriptor per
/// destination kind, every section always present and defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub console: ConsoleConfig,
    pub file: FileConfig,
    pub chat: ChatConfig,
    pub push: PushConfig,
    pub mail: MailConfig,
}

impl Config {
    /// Loads and validates configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses and validates configuration from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yml::from_str(text)?;
        Self::from_value(value)
    }

    /// Builds a validated configuration from a structured map, overlaying
    /// the supplied sections on the defaults. `${NAME}` placeholders are
    /// expanded here; unresolved ones pass through literally.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let value = expand_env_vars(value);
        Config::default().merged(&value)
    }

    /// Returns a new configuration with `partial` shallow-merged in:
    /// destinations are keyed by kind and a supplied kind's settings
    /// overwrite the base field by field. The result is validated as a
    /// whole; on error `self` is untouched.
    ///
    /// A top-level `destinations` wrapper key is accepted and treated
    /// identically to the flat form.
    pub fn merged(&self, partial: &Value) -> Result<Self, ConfigError> {
        let sections = match partial {
            Value::Object(map) => match map.get("destinations") {
                Some(Value::Object(nested)) if map.len() == 1 => nested,
                Some(other) if map.len() == 1 => {
                    return Err(ConfigError::Shape(format!(
                        "`destinations` must be a mapping, got {}",
                        json_type_name(other)
                    )))
                }
                _ => map,
            },
            Value::Null => return self.validated(),
            other => {
                return Err(ConfigError::Shape(format!(
                    "configuration must be a mapping, got {}",
                    json_type_name(other)
                )))
            }
        };

        let mut base = serde_json::to_value(self)
            .map_err(|e| ConfigError::Shape(e.to_string()))?;

        for (key, section) in sections {
            let kind: DestinationKind = key
                .parse()
                .map_err(|_| ConfigError::UnknownKind(key.clone()))?;
            let fields = section.as_object().ok_or_else(|| {
                ConfigError::Shape(format!(
                    "configuration for `{}` must be a mapping, got {}",
                    kind,
                    json_type_name(section)
                ))
            })?;
            if let Some(Value::Object(base_section)) = base.get_mut(kind.as_str()) {
                for (field, value) in fields {
                    base_section.insert(field.clone(), value.clone());
                }
            }
        }

        let merged: Config =
            serde_json::from_value(base).map_err(|e| ConfigError::Shape(e.to_string()))?;
        merged.validated()
    }

    fn validated(&self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self.clone())
    }

    /// Checks every enabled destination for its required fields, collecting
    /// all problems at once. A failed validation rejects the whole
    /// configuration; nothing is partially applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if self.file.enabled {
            if self.file.filename.as_os_str().is_empty() {
                issues.push("file: `filename` must not be empty".to_string());
            }
            if self.file.max_size == 0 {
                issues.push("file: `max_size` must be greater than zero".to_string());
            }
        }

        if self.chat.enabled {
            if self.chat.bot_token.is_empty() {
                issues.push("chat: `bot_token` must not be empty".to_string());
            }
            if self.chat.chat_id.is_empty() {
                issues.push("chat: `chat_id` must not be empty".to_string());
            }
        }

        if self.push.enabled {
            if self.push.targets.is_empty() {
                issues.push("push: at least one target is required".to_string());
            }
            for (index, target) in self.push.targets.iter().enumerate() {
                if target.user_key.is_empty() {
                    issues.push(format!("push: target {} is missing `user_key`", index));
                }
                if target.api_token.is_empty() {
                    issues.push(format!("push: target {} is missing `api_token`", index));
                }
            }
        }

        if self.mail.enabled {
            for (value, field) in [
                (&self.mail.smtp_host, "smtp_host"),
                (&self.mail.username, "username"),
                (&self.mail.password, "password"),
                (&self.mail.from_addr, "from"),
            ] {
                if value.is_empty() {
                    issues.push(format!("mail: `{}` must not be empty", field));
                }
            }
            if self.mail.to.is_empty() {
                issues.push("mail: `to` must list at least one recipient".to_string());
            }
            if self.mail.smtp_port == 0 {
                issues.push("mail: `smtp_port` must be greater than zero".to_string());
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation { issues })
        }
    }

    /// The serialized structured-map form. Loading it back yields an equal
    /// configuration, and serializing that again yields the same map.
    pub fn to_value(&self) -> Value {
        // Config contains nothing a JSON tree cannot represent.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Serializes the configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Persists the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether the given destination is enabled.
    pub fn is_enabled(&self, kind: DestinationKind) -> bool {
        match kind {
            DestinationKind::Console => self.console.enabled,
            DestinationKind::File => self.file.enabled,
            DestinationKind::Chat => self.chat.enabled,
            DestinationKind::Push => self.push.enabled,
            DestinationKind::Mail => self.mail.enabled,
        }
    }

    pub(crate) fn set_enabled(&mut self, kind: DestinationKind, enabled: bool) {
        match kind {
            DestinationKind::Console => self.console.enabled = enabled,
            DestinationKind::File => self.file.enabled = enabled,
            DestinationKind::Chat => self.chat.enabled = enabled,
            DestinationKind::Push => self.push.enabled = enabled,
            DestinationKind::Mail => self.mail.enabled = enabled,
        }
    }

    /// The configured severity threshold for the given destination.
    pub fn level(&self, kind: DestinationKind) -> Severity {
        match kind {
            DestinationKind::Console => self.console.level,
            DestinationKind::File => self.file.level,
            DestinationKind::Chat => self.chat.level,
            DestinationKind::Push => self.push.level,
            DestinationKind::Mail => self.mail.level,
        }
    }

    pub(crate) fn set_level(&mut self, kind: DestinationKind, level: Severity) {
        match kind {
            DestinationKind::Console => self.console.level = level,
            DestinationKind::File => self.file.level = level,
            DestinationKind::Chat => self.chat.level = level,
            DestinationKind::Push => self.push.level = level,
            DestinationKind::Mail => self.mail.level = level,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

static ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern"));

/// Recursively expands `${NAME}` placeholders in every string of a value
/// tree. Placeholders for unset variables are left in place.
fn expand_env_vars(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let expanded = ENV_VAR.replace_all(&s, |caps: &Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            });
            Value::String(expanded.into_owned())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(expand_env_vars).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, expand_env_vars(value)))
                .collect(),
        ),
        other => other,
    }
}
