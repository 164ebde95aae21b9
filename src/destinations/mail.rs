//! Email destination: one SMTP session per delivery.
//!
//! The SMTP session itself sits behind the [`MailTransport`] seam so the
//! destination logic (subject prefixing, recipient overrides, severity
//! subjects) is testable without a mail server.

use super::SinkState;
use crate::config::MailConfig;
use crate::core::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::formatting;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

const SESSION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SUBJECT: &str = "Notification";

/// A fully composed outgoing message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// The blocking send capability the mail destination drives through
/// `spawn_blocking`. Implementations own the whole session: connect,
/// optional TLS upgrade, authenticate, send, close.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> DeliveryResult;
}

/// Real SMTP transport. Each send opens a fresh session and closes it
/// regardless of outcome.
pub struct SmtpMailTransport {
    host: String,
    port: u16,
    use_tls: bool,
    username: String,
    password: String,
}

impl SmtpMailTransport {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            use_tls: config.use_tls,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn compose(mail: &OutgoingMail) -> Result<Message, DeliveryError> {
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|e| DeliveryError::Smtp(format!("invalid sender `{}`: {}", mail.from, e)))?;
        let mut builder = Message::builder().from(from).subject(&mail.subject);
        for recipient in &mail.to {
            let to: Mailbox = recipient.parse().map_err(|e| {
                DeliveryError::Smtp(format!("invalid recipient `{}`: {}", recipient, e))
            })?;
            builder = builder.to(to);
        }
        let body = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone());
        builder
            .multipart(MultiPart::mixed().singlepart(body))
            .map_err(|e| DeliveryError::Smtp(e.to_string()))
    }
}

impl MailTransport for SmtpMailTransport {
    fn send(&self, mail: &OutgoingMail) -> DeliveryResult {
        if self.host.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }
        let message = Self::compose(mail)?;

        let builder = if self.use_tls {
            SmtpTransport::starttls_relay(&self.host)
                .map_err(|e| DeliveryError::Smtp(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&self.host)
        };
        let transport = builder
            .port(self.port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .timeout(Some(SESSION_TIMEOUT))
            .build();

        transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| DeliveryError::Smtp(e.to_string()))
    }
}

/// A destination that emails formatted records.
pub struct MailDestination {
    state: SinkState,
    template: String,
    date_format: String,
    from_addr: String,
    to: Vec<String>,
    subject_prefix: String,
    transport: Arc<dyn MailTransport>,
}

impl MailDestination {
    pub fn new(config: &MailConfig) -> Self {
        Self::with_transport(config, Arc::new(SmtpMailTransport::new(config)))
    }

    /// Builds a mail destination on top of a custom transport.
    pub fn with_transport(config: &MailConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            state: SinkState::new(config.enabled, config.level),
            template: config.format.clone(),
            date_format: config.date_format.clone(),
            from_addr: config.from_addr.clone(),
            to: config.to.clone(),
            subject_prefix: config.subject_prefix.clone(),
            transport,
        }
    }

    fn prefixed_subject(&self, subject: &str) -> String {
        if self.subject_prefix.is_empty() || subject.starts_with(&self.subject_prefix) {
            subject.to_string()
        } else {
            format!("{} {}", self.subject_prefix, subject)
        }
    }

    async fn send_mail(&self, mail: OutgoingMail) -> DeliveryResult {
        if mail.to.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }
        let transport = Arc::clone(&self.transport);
        task::spawn_blocking(move || transport.send(&mail))
            .await
            .map_err(|e| DeliveryError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Destination for MailDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Mail
    }

    fn is_enabled(&self) -> bool {
        self.state.enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn threshold(&self) -> Severity {
        self.state.threshold()
    }

    fn set_threshold(&self, threshold: Severity) {
        self.state.set_threshold(threshold);
    }

    fn format(&self, record: &Record) -> String {
        formatting::render(&self.template, &self.date_format, record)
    }

    async fn deliver(&self, record: &Record, rendered: &str) -> DeliveryResult {
        let subject =
            self.prefixed_subject(&format!("{}: {}", record.severity, record.source));
        self.send_mail(OutgoingMail {
            from: self.from_addr.clone(),
            to: self.to.clone(),
            subject,
            body: rendered.to_string(),
        })
        .await
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        let subject = self.prefixed_subject(message.title.as_deref().unwrap_or(DEFAULT_SUBJECT));
        let to = match &message.recipients {
            Some(recipients) if !recipients.is_empty() => recipients.clone(),
            _ => self.to.clone(),
        };
        vec![
            self.send_mail(OutgoingMail {
                from: self.from_addr.clone(),
                to,
                subject,
                body: message.body.clone(),
            })
            .await,
        ]
    }
}
