//! Shared test doubles for integration tests.

use async_trait::async_trait;
use logfan::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Installs a test subscriber so dispatcher diagnostics show up under
/// `RUST_LOG=logfan=debug`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A destination that records every delivery instead of performing I/O.
pub struct MockDestination {
    kind: DestinationKind,
    enabled: AtomicBool,
    threshold: RwLock<Severity>,
    delivered: Mutex<Vec<String>>,
    direct: Mutex<Vec<String>>,
    fail: bool,
}

impl MockDestination {
    pub fn new(kind: DestinationKind, enabled: bool, threshold: Severity) -> Arc<Self> {
        Arc::new(Self {
            kind,
            enabled: AtomicBool::new(enabled),
            threshold: RwLock::new(threshold),
            delivered: Mutex::new(Vec::new()),
            direct: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing(kind: DestinationKind, threshold: Severity) -> Arc<Self> {
        Arc::new(Self {
            kind,
            enabled: AtomicBool::new(true),
            threshold: RwLock::new(threshold),
            delivered: Mutex::new(Vec::new()),
            direct: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    /// Messages that arrived through the routed delivery path.
    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    /// Messages that arrived through the direct-send path.
    pub fn direct(&self) -> Vec<String> {
        self.direct.lock().unwrap().clone()
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn kind(&self) -> DestinationKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn threshold(&self) -> Severity {
        *self.threshold.read().unwrap()
    }

    fn set_threshold(&self, threshold: Severity) {
        *self.threshold.write().unwrap() = threshold;
    }

    fn format(&self, record: &Record) -> String {
        format!("{}: {}", record.severity, record.message)
    }

    async fn deliver(&self, _record: &Record, rendered: &str) -> DeliveryResult {
        if self.fail {
            return Err(DeliveryError::Task("mock wired to fail".to_string()));
        }
        self.delivered.lock().unwrap().push(rendered.to_string());
        Ok(())
    }

    async fn direct_send(&self, message: &DirectMessage) -> Vec<DeliveryResult> {
        if self.fail {
            return vec![Err(DeliveryError::Task("mock wired to fail".to_string()))];
        }
        self.direct.lock().unwrap().push(message.body.clone());
        vec![Ok(())]
    }
}
