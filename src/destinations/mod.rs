//! Destination implementations, one per kind.
//!
//! Every sink shares the same small piece of in-place-mutable state: the
//! `enabled` flag and the severity threshold. Everything else on a live
//! instance is immutable; changing a transport-related field goes through
//! a full rebuild in the dispatcher.

pub mod chat;
pub mod console;
pub mod file;
pub mod mail;
pub mod push;

use crate::config::Config;
use crate::core::{Destination, Severity};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

pub use chat::ChatDestination;
pub use console::ConsoleDestination;
pub use file::{FileDestination, RotatingFileWriter};
pub use mail::{MailDestination, MailTransport, OutgoingMail, SmtpMailTransport};
pub use push::PushDestination;

/// The only two fields mutable on a live destination instance.
#[derive(Debug)]
pub(crate) struct SinkState {
    enabled: AtomicBool,
    threshold: AtomicU8,
}

impl SinkState {
    pub fn new(enabled: bool, threshold: Severity) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            threshold: AtomicU8::new(threshold as u8),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn threshold(&self) -> Severity {
        Severity::from_index(self.threshold.load(Ordering::Relaxed))
    }

    pub fn set_threshold(&self, threshold: Severity) {
        self.threshold.store(threshold as u8, Ordering::Relaxed);
    }
}

/// Constructs one live instance per destination kind, in canonical
/// configuration order. Construction itself performs no I/O: files open
/// lazily on first delivery and network clients connect per send.
pub fn build_registry(config: &Config) -> Vec<Arc<dyn Destination>> {
    vec![
        Arc::new(ConsoleDestination::new(&config.console)),
        Arc::new(FileDestination::new(&config.file)),
        Arc::new(ChatDestination::new(&config.chat)),
        Arc::new(PushDestination::new(&config.push)),
        Arc::new(MailDestination::new(&config.mail)),
    ]
}
