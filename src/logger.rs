//! The public logging facade and the process-wide default logger.
//!
//! A `Logger` is a cheap-to-clone handle over a shared [`Dispatcher`].
//! Several loggers with different source names can share one dispatcher,
//! so every module of an application logs through the same destination
//! set under its own name.

use crate::config::{Config, ConfigError};
use crate::core::{
    DeliveryError, DeliveryResult, DestinationKind, DirectMessage, Record, Severity,
};
use crate::dispatcher::Dispatcher;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// A named handle onto a shared dispatcher.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    dispatcher: Arc<Dispatcher>,
}

impl Logger {
    /// Builds a logger (and its dispatcher) from a validated configuration.
    pub fn new(config: Config, name: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into().into(),
            dispatcher: Arc::new(Dispatcher::new(config)?),
        })
    }

    /// Builds a logger from a YAML configuration file.
    pub fn from_yaml_file(
        path: impl AsRef<Path>,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::new(Config::load(path)?, name)
    }

    /// Wraps an existing dispatcher under the given source name.
    pub fn from_dispatcher(dispatcher: Arc<Dispatcher>, name: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
            dispatcher,
        }
    }

    /// A sibling logger sharing this logger's dispatcher under another
    /// source name.
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into().into(),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    // -------------------------------------------------------------------
    // Logging
    // -------------------------------------------------------------------

    /// Logs a pre-rendered message at the given severity.
    ///
    /// This call is best-effort fan-out: it never fails or panics, no
    /// matter how many destinations are broken. The returned future
    /// resolves once every accepting destination has had its attempt.
    #[track_caller]
    pub fn log(
        &self,
        severity: Severity,
        message: impl Into<String>,
    ) -> impl Future<Output = ()> + Send + '_ {
        let record = Record::new(severity, message, self.name.as_ref());
        async move { self.dispatcher.route(&record).await }
    }

    /// Logs a `{}`-templated message. Interpolation failures degrade to
    /// the raw template with an error marker; they never reach the caller.
    #[track_caller]
    pub fn log_with<'a>(
        &'a self,
        severity: Severity,
        template: &str,
        args: &[&dyn fmt::Display],
    ) -> impl Future<Output = ()> + Send + 'a {
        let record = Record::with_args(severity, template, args, self.name.as_ref());
        async move { self.dispatcher.route(&record).await }
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Debug, message)
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Info, message)
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Warning, message)
    }

    /// Alias for [`Logger::warning`].
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Warning, message)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Error, message)
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) -> impl Future<Output = ()> + Send + '_ {
        self.log(Severity::Critical, message)
    }

    // -------------------------------------------------------------------
    // Direct sends
    // -------------------------------------------------------------------

    /// Sends an out-of-band message to one destination, bypassing its
    /// severity threshold. Disabled destinations refuse without I/O.
    pub async fn send_direct(
        &self,
        kind: DestinationKind,
        message: DirectMessage,
    ) -> Vec<DeliveryResult> {
        self.dispatcher.send_direct(kind, &message).await
    }

    /// Sends a direct chat message, optionally overriding the markup mode.
    pub async fn send_chat(
        &self,
        body: impl Into<String>,
        parse_mode: Option<String>,
    ) -> DeliveryResult {
        let mut message = DirectMessage::new(body);
        message.parse_mode = parse_mode;
        single(self.send_direct(DestinationKind::Chat, message).await)
    }

    /// Sends a direct push message, optionally to one named target and
    /// with priority/title overrides. Returns one result per attempted
    /// target.
    pub async fn send_push(
        &self,
        body: impl Into<String>,
        target: Option<String>,
        priority: Option<i8>,
        title: Option<String>,
    ) -> Vec<DeliveryResult> {
        let mut message = DirectMessage::new(body);
        message.target = target;
        message.priority = priority;
        message.title = title;
        self.send_direct(DestinationKind::Push, message).await
    }

    /// Sends a direct email, optionally overriding the recipient list.
    pub async fn send_mail(
        &self,
        subject: impl Into<String>,
        body: impl Into<String>,
        recipients: Option<Vec<String>>,
    ) -> DeliveryResult {
        let mut message = DirectMessage::new(body).title(subject);
        message.recipients = recipients;
        single(self.send_direct(DestinationKind::Mail, message).await)
    }

    // -------------------------------------------------------------------
    // Runtime control
    // -------------------------------------------------------------------

    pub async fn enable(&self, kind: DestinationKind) -> Result<(), ConfigError> {
        self.dispatcher.enable(kind).await
    }

    pub async fn disable(&self, kind: DestinationKind) {
        self.dispatcher.disable(kind).await
    }

    pub async fn set_threshold(&self, kind: DestinationKind, threshold: Severity) {
        self.dispatcher.set_threshold(kind, threshold).await
    }

    pub async fn is_enabled(&self, kind: DestinationKind) -> bool {
        self.dispatcher.is_enabled(kind).await
    }

    /// Applies a partial configuration update atomically; see
    /// [`Dispatcher::update_config`].
    pub async fn update_config(&self, partial: &Value) -> Result<(), ConfigError> {
        self.dispatcher.update_config(partial).await
    }

    pub async fn config(&self) -> Config {
        self.dispatcher.config().await
    }

    /// Persists the current configuration as YAML.
    pub async fn save_config(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.config().await.save(path)
    }

    pub async fn destinations(&self) -> Vec<DestinationKind> {
        self.dispatcher.destinations().await
    }

    pub async fn enabled_destinations(&self) -> Vec<DestinationKind> {
        self.dispatcher.enabled_destinations().await
    }

    /// Drives a synthetic message through every enabled destination and
    /// reports per-destination success.
    pub async fn test_all(&self) -> BTreeMap<DestinationKind, bool> {
        self.dispatcher.test_all().await
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

fn single(mut results: Vec<DeliveryResult>) -> DeliveryResult {
    results.pop().unwrap_or(Err(DeliveryError::Disabled))
}

// ---------------------------------------------------------------------------
// Process-wide default logger
// ---------------------------------------------------------------------------

static GLOBAL_LOGGER: OnceCell<Logger> = OnceCell::new();

/// Error returned when [`init`] is called a second time.
#[derive(Debug, Error)]
#[error("global logger already initialized")]
pub struct AlreadyInitialized;

/// Installs `logger` as the process-wide default. Single assignment:
/// the first call wins and every later call returns an error.
pub fn init(logger: Logger) -> Result<(), AlreadyInitialized> {
    GLOBAL_LOGGER.set(logger).map_err(|_| AlreadyInitialized)
}

/// The process-wide default logger, if [`init`] has been called.
pub fn global() -> Option<&'static Logger> {
    GLOBAL_LOGGER.get()
}
