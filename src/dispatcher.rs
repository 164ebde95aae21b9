//! The destination registry and dispatch core.
//!
//! A `Dispatcher` owns the live set of destination instances and the
//! configuration they were built from. Routing fans every record out to
//! all enabled destinations whose threshold is met; each delivery runs in
//! its own failure boundary, so one broken or slow destination can never
//! suppress another's output or surface an error to the logging caller.
//!
//! Registry mutation is guarded by a single coarse lock. Reads snapshot
//! the instance list and release the lock before any delivery starts, so
//! no lock is held across a transport call.

use crate::config::{Config, ConfigError};
use crate::core::{
    DeliveryError, DeliveryResult, Destination, DestinationKind, DirectMessage, Record, Severity,
};
use crate::destinations::build_registry;
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const TEST_MESSAGE: &str = "logfan test message";

struct Inner {
    config: Config,
    registry: Vec<Arc<dyn Destination>>,
}

impl Inner {
    fn find(&self, kind: DestinationKind) -> Option<&Arc<dyn Destination>> {
        self.registry.iter().find(|d| d.kind() == kind)
    }
}

/// Routes log records and direct messages to a set of destinations, and
/// applies runtime configuration changes atomically.
pub struct Dispatcher {
    inner: RwLock<Inner>,
}

impl Dispatcher {
    /// Builds a dispatcher from a validated configuration, constructing
    /// one destination instance per kind.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = build_registry(&config);
        Ok(Self {
            inner: RwLock::new(Inner { config, registry }),
        })
    }

    /// Builds a dispatcher over an explicit destination set, primarily so
    /// tests can observe deliveries through fake destinations.
    pub fn with_destinations(
        config: Config,
        destinations: Vec<Arc<dyn Destination>>,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner {
                config,
                registry: destinations,
            }),
        }
    }

    /// Fans a record out to every enabled destination whose threshold is
    /// met. Never fails: delivery errors are reported per destination and
    /// the remaining destinations still receive the record.
    pub async fn route(&self, record: &Record) {
        let accepted: Vec<Arc<dyn Destination>> = {
            let inner = self.inner.read().await;
            inner
                .registry
                .iter()
                .filter(|d| d.accepts(record.severity))
                .cloned()
                .collect()
        };

        let deliveries = accepted.iter().map(|destination| async move {
            let rendered = destination.format(record);
            if let Err(error) = destination.deliver(record, &rendered).await {
                warn!(kind = %destination.kind(), %error, "delivery failed");
            }
        });
        join_all(deliveries).await;
    }

    /// Enables a destination at runtime.
    ///
    /// An enabled descriptor must carry the fields its kind requires, so
    /// the updated configuration is re-validated first; on error nothing
    /// changes. When the live instance exists the flag flips in place;
    /// otherwise the registry is rebuilt from the updated configuration.
    pub async fn enable(&self, kind: DestinationKind) -> Result<(), ConfigError> {
        let mut inner = self.inner.write().await;
        let mut updated = inner.config.clone();
        updated.set_enabled(kind, true);
        updated.validate()?;
        inner.config = updated;
        let flipped = inner.find(kind).map(|d| d.set_enabled(true)).is_some();
        if !flipped {
            // No live instance for this kind; rebuild from the updated config.
            inner.registry = build_registry(&inner.config);
        }
        debug!(kind = %kind, "destination enabled");
        Ok(())
    }

    /// Disables a destination at runtime. A disabled destination never
    /// delivers, even via direct send.
    pub async fn disable(&self, kind: DestinationKind) {
        let mut inner = self.inner.write().await;
        inner.config.set_enabled(kind, false);
        if let Some(destination) = inner.find(kind) {
            destination.set_enabled(false);
        }
        debug!(kind = %kind, "destination disabled");
    }

    /// Changes a destination's severity threshold in place.
    pub async fn set_threshold(&self, kind: DestinationKind, threshold: Severity) {
        let mut inner = self.inner.write().await;
        inner.config.set_level(kind, threshold);
        if let Some(destination) = inner.find(kind) {
            destination.set_threshold(threshold);
        }
    }

    /// Merges a partial configuration, re-validates the result, and
    /// rebuilds every destination instance. On validation failure the
    /// prior configuration and registry are left untouched.
    pub async fn update_config(&self, partial: &Value) -> Result<(), ConfigError> {
        let mut inner = self.inner.write().await;
        let merged = inner.config.merged(partial)?;
        inner.registry = build_registry(&merged);
        inner.config = merged;
        debug!("configuration updated, registry rebuilt");
        Ok(())
    }

    /// The current configuration.
    pub async fn config(&self) -> Config {
        self.inner.read().await.config.clone()
    }

    /// Sends an out-of-band message to one destination, bypassing its
    /// severity threshold. A missing or disabled destination yields a
    /// failure result without attempting any I/O.
    pub async fn send_direct(
        &self,
        kind: DestinationKind,
        message: &DirectMessage,
    ) -> Vec<DeliveryResult> {
        let destination = { self.inner.read().await.find(kind).cloned() };
        match destination {
            Some(destination) if destination.is_enabled() => {
                destination.direct_send(message).await
            }
            _ => vec![Err(DeliveryError::Disabled)],
        }
    }

    /// Whether the given destination currently exists and is enabled.
    pub async fn is_enabled(&self, kind: DestinationKind) -> bool {
        self.inner
            .read()
            .await
            .find(kind)
            .map(|d| d.is_enabled())
            .unwrap_or(false)
    }

    /// All destinations in the registry, in configuration order.
    pub async fn destinations(&self) -> Vec<DestinationKind> {
        self.inner
            .read()
            .await
            .registry
            .iter()
            .map(|d| d.kind())
            .collect()
    }

    /// The currently enabled destinations, in configuration order.
    pub async fn enabled_destinations(&self) -> Vec<DestinationKind> {
        self.inner
            .read()
            .await
            .registry
            .iter()
            .filter(|d| d.is_enabled())
            .map(|d| d.kind())
            .collect()
    }

    /// Drives a synthetic delivery through every enabled destination and
    /// reports per-destination success. Console and file go through the
    /// normal deliver path; the network kinds go through `direct_send`.
    /// Disabled destinations report `false` without an attempt.
    pub async fn test_all(&self) -> BTreeMap<DestinationKind, bool> {
        let destinations: Vec<Arc<dyn Destination>> =
            { self.inner.read().await.registry.clone() };

        let checks = destinations.iter().map(|destination| async move {
            let kind = destination.kind();
            if !destination.is_enabled() {
                return (kind, false);
            }
            let healthy = match kind {
                DestinationKind::Console | DestinationKind::File => {
                    let record = Record::new(Severity::Info, TEST_MESSAGE, "logfan");
                    let rendered = destination.format(&record);
                    destination.deliver(&record, &rendered).await.is_ok()
                }
                DestinationKind::Chat | DestinationKind::Mail => {
                    let message = DirectMessage::new(TEST_MESSAGE).title("logfan test");
                    destination
                        .direct_send(&message)
                        .await
                        .iter()
                        .all(|r| r.is_ok())
                }
                DestinationKind::Push => {
                    // A push group is healthy when any target is reachable.
                    let message = DirectMessage::new(TEST_MESSAGE).title("logfan test");
                    destination
                        .direct_send(&message)
                        .await
                        .iter()
                        .any(|r| r.is_ok())
                }
            };
            (kind, healthy)
        });

        join_all(checks).await.into_iter().collect()
    }
}
