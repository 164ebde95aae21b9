//! Core domain types and the destination trait contract
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern how log events flow from the facade through the dispatcher
//! to the individual destinations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use thiserror::Error;

/// Log severity, ordered by ascending urgency.
///
/// A destination thresholded at `T` admits any record whose severity is
/// greater than or equal to `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Critical = 4,
}

impl Severity {
    /// All severities, lowest first.
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// The canonical upper-case name for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Reconstructs a severity from its `repr(u8)` discriminant.
    /// Out-of-range values saturate to `Critical`.
    pub(crate) fn from_index(index: u8) -> Severity {
        match index {
            0 => Severity::Debug,
            1 => Severity::Info,
            2 => Severity::Warning,
            3 => Severity::Error,
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized severity name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized severity `{0}`")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Case-insensitive parse of a severity name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            // WARN is accepted as an alias, matching the facade method.
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

impl serde::Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = <String as serde::Deserialize>::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// The closed set of destination kinds a dispatcher can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestinationKind {
    Console,
    File,
    Chat,
    Push,
    Mail,
}

impl DestinationKind {
    /// All kinds, in canonical configuration order.
    pub const ALL: [DestinationKind; 5] = [
        DestinationKind::Console,
        DestinationKind::File,
        DestinationKind::Chat,
        DestinationKind::Push,
        DestinationKind::Mail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::Console => "console",
            DestinationKind::File => "file",
            DestinationKind::Chat => "chat",
            DestinationKind::Push => "push",
            DestinationKind::Mail => "mail",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a caller names a destination kind that does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown destination kind `{0}`")]
pub struct UnknownKindError(pub String);

impl FromStr for DestinationKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(DestinationKind::Console),
            "file" => Ok(DestinationKind::File),
            "chat" => Ok(DestinationKind::Chat),
            "push" => Ok(DestinationKind::Push),
            "mail" => Ok(DestinationKind::Mail),
            _ => Err(UnknownKindError(s.to_string())),
        }
    }
}

/// The message carried by a record.
///
/// Interpolation happens once, at record construction, and never fails:
/// a template whose placeholders do not line up with the supplied
/// arguments degrades to the raw template plus an error marker, which
/// formatters render as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// A fully rendered message.
    Rendered(String),
    /// A template that could not be interpolated.
    Degraded { template: String, error: String },
}

impl MessageContent {
    /// Interpolates `{}` placeholders in `template` with `args`, left to
    /// right. A placeholder/argument count mismatch degrades instead of
    /// failing.
    pub fn render(template: &str, args: &[&dyn fmt::Display]) -> Self {
        let parts: Vec<&str> = template.split("{}").collect();
        let placeholders = parts.len() - 1;
        if placeholders != args.len() {
            return MessageContent::Degraded {
                template: template.to_string(),
                error: format!(
                    "template expects {} arguments, {} supplied",
                    placeholders,
                    args.len()
                ),
            };
        }

        let mut rendered = String::with_capacity(template.len());
        for (i, part) in parts.iter().enumerate() {
            rendered.push_str(part);
            if i < args.len() {
                rendered.push_str(&args[i].to_string());
            }
        }
        MessageContent::Rendered(rendered)
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageContent::Rendered(message) => f.write_str(message),
            MessageContent::Degraded { template, error } => {
                write!(f, "{} [unformatted: {}]", template, error)
            }
        }
    }
}

/// Best-effort origin of a log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

/// A single log event, created once per log call and never mutated.
///
/// Each destination formats the same record independently, so a record
/// carries no pre-rendered per-destination text.
#[derive(Debug, Clone)]
pub struct Record {
    pub severity: Severity,
    pub message: MessageContent,
    pub timestamp: DateTime<Utc>,
    /// Logical logger name the event was emitted under.
    pub source: String,
    pub call_site: Option<CallSite>,
}

impl Record {
    /// Builds a record from a pre-rendered message. Never fails.
    #[track_caller]
    pub fn new(severity: Severity, message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            severity,
            message: MessageContent::Rendered(message.into()),
            timestamp: Utc::now(),
            source: source.into(),
            call_site: Some(CallSite::from_location(Location::caller())),
        }
    }

    /// Builds a record by interpolating `{}` placeholders in `template`.
    /// Interpolation failures degrade; construction itself never fails.
    #[track_caller]
    pub fn with_args(
        severity: Severity,
        template: &str,
        args: &[&dyn fmt::Display],
        source: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: MessageContent::render(template, args),
            timestamp: Utc::now(),
            source: source.into(),
            call_site: Some(CallSite::from_location(Location::caller())),
        }
    }
}

/// An out-of-band message that bypasses severity filtering.
#[derive(Debug, Clone, Default)]
pub struct DirectMessage {
    /// The message body.
    pub body: String,
    /// Push title or mail subject.
    pub title: Option<String>,
    /// Named push sub-destination to deliver to; `None` means all.
    pub target: Option<String>,
    /// Push priority override.
    pub priority: Option<i8>,
    /// Chat markup mode override (e.g. "HTML", "Markdown").
    pub parse_mode: Option<String>,
    /// Mail recipient override.
    pub recipients: Option<Vec<String>>,
}

impl DirectMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn priority(mut self, priority: i8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn parse_mode(mut self, parse_mode: impl Into<String>) -> Self {
        self.parse_mode = Some(parse_mode.into());
        self
    }

    pub fn recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = Some(recipients);
        self
    }
}

/// A failed delivery attempt. Caught at the destination boundary and
/// surfaced as a value; never raised into the caller of `log`.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("destination is disabled")]
    Disabled,
    #[error("destination is not configured")]
    NotConfigured,
    #[error("unknown push target `{0}`")]
    UnknownTarget(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("smtp failure: {0}")]
    Smtp(String),
    #[error("delivery failed for push targets: {0}")]
    PushTargets(String),
    #[error("delivery task failed: {0}")]
    Task(String),
}

/// Outcome of a single delivery attempt.
pub type DeliveryResult = Result<(), DeliveryError>;

// =============================================================================
// Destination contract
// =============================================================================

/// A live sink for log records.
///
/// Exactly one instance per kind exists inside a dispatcher. Only the
/// `enabled` flag and the severity threshold may be mutated on a live
/// instance; any field touching the underlying transport requires the
/// dispatcher to rebuild the instance.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Which kind of sink this is.
    fn kind(&self) -> DestinationKind;

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn threshold(&self) -> Severity;

    fn set_threshold(&self, threshold: Severity);

    /// Whether a record of the given severity should be delivered here.
    fn accepts(&self, severity: Severity) -> bool {
        self.is_enabled() && severity >= self.threshold()
    }

    /// Renders the record using this destination's template. Never fails;
    /// template errors fall back to the raw message.
    fn format(&self, record: &Record) -> String;

    /// Performs the side effect for a routed record. `rendered` is the
    /// output of [`Destination::format`]; the record rides along so
    /// subject and title lines can carry severity and source.
    ///
    /// All transport failures are converted to [`DeliveryError`];
    /// implementations must not panic past this boundary.
    async fn deliver(&self, record: &Record, rendered: &str) -> DeliveryResult;

    /// Sends an out-of-band message, bypassing severity filtering.
    ///
    /// Single-target kinds return exactly one result. Push returns one
    /// result per sub-destination, or a single-element list when a named
    /// target is selected; an unknown target name yields a single failure
    /// result rather than an error.
    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("debug".parse::<Severity>().unwrap(), Severity::Debug);
        assert_eq!("Info".parse::<Severity>().unwrap(), Severity::Info);
        assert_eq!("WARNING".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("CrItIcAl".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serde_round_trips_canonically() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let back: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(back, Severity::Warning);
    }

    #[test]
    fn destination_kind_parses_known_names_only() {
        assert_eq!(
            "console".parse::<DestinationKind>().unwrap(),
            DestinationKind::Console
        );
        assert_eq!(
            "mail".parse::<DestinationKind>().unwrap(),
            DestinationKind::Mail
        );
        let err = "telegram".parse::<DestinationKind>().unwrap_err();
        assert_eq!(err, UnknownKindError("telegram".to_string()));
    }

    #[test]
    fn message_interpolation_renders_in_order() {
        let message = MessageContent::render("user {} logged in from {}", &[&"alice", &"10.0.0.1"]);
        assert_eq!(
            message,
            MessageContent::Rendered("user alice logged in from 10.0.0.1".to_string())
        );
    }

    #[test]
    fn message_interpolation_mismatch_degrades() {
        let message = MessageContent::render("user {} logged in from {}", &[&"alice"]);
        match &message {
            MessageContent::Degraded { template, error } => {
                assert_eq!(template, "user {} logged in from {}");
                assert!(error.contains("expects 2"));
            }
            other => panic!("expected degraded message, got {:?}", other),
        }
        // The display form keeps the raw template visible.
        assert!(message.to_string().starts_with("user {} logged in from {}"));
        assert!(message.to_string().contains("unformatted"));
    }

    #[test]
    fn record_construction_never_fails_and_captures_call_site() {
        let record = Record::new(Severity::Info, "hello", "test");
        assert_eq!(record.severity, Severity::Info);
        assert_eq!(record.source, "test");
        let call_site = record.call_site.expect("call site should be captured");
        assert!(call_site.file.ends_with("core.rs"));
        assert!(call_site.line > 0);
    }
}
