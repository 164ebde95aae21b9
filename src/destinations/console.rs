//! Console destination: writes formatted lines to standard output.

use super::SinkState;
use crate::config::ConsoleConfig;
use crate::core::{
    DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::formatting;
use async_trait::async_trait;
use std::io::Write;
use tokio::sync::Mutex;

/// A destination that writes to the process's standard output stream.
///
/// The writer is injectable so tests can capture output instead of
/// printing it.
pub struct ConsoleDestination {
    state: SinkState,
    template: String,
    date_format: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleDestination {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stdout()))
    }

    /// Builds a console destination writing to `writer` instead of stdout.
    pub fn with_writer(config: &ConsoleConfig, writer: Box<dyn Write + Send>) -> Self {
        Self {
            state: SinkState::new(config.enabled, config.level),
            template: config.format.clone(),
            date_format: config.date_format.clone(),
            writer: Mutex::new(writer),
        }
    }

    async fn write_line(&self, line: &str) -> DeliveryResult {
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Destination for ConsoleDestination {
    fn kind(&self) -> DestinationKind {
        DestinationKind::Console
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

    async fn deliver(&self, _record: &Record, rendered: &str) -> DeliveryResult {
        self.write_line(rendered).await
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        vec![self.write_line(&message.body).await]
    }
}
