//! Websocket front end for coup tables.
//!
//! One [`ConnectionRegistry`] holds every live connection; each connection
//! runs a read pump and a write pump joined by a bounded mailbox. Decoded
//! envelopes go to the [`Dispatcher`], which drives the table's
//! [`coup_execution::GameSession`] under that table's lock and fans the
//! resulting projections back out through the registry.

use std::sync::Arc;

mod api;
pub use api::Api;

pub mod client;
pub mod config;
pub use config::{ConfigError, ServerConfig};
pub mod dispatch;
pub use dispatch::{DispatchError, Dispatcher};
pub mod i18n;
pub use i18n::{Catalog, LocalizeError, Localizer};
pub mod metrics;
pub use metrics::{WsMetrics, WsMetricsSnapshot};
pub mod registry;
pub use registry::{ConnectionRegistry, RegistryError};
pub mod tables;
pub use tables::Tables;

/// Everything a connection handler needs, shared across tasks.
pub struct Server {
    pub config: ServerConfig,
    pub metrics: Arc<WsMetrics>,
    pub registry: Arc<ConnectionRegistry>,
    pub tables: Arc<Tables>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: ServerConfig, localizer: Arc<dyn Localizer>) -> Result<Self, ConfigError> {
        config.validate()?;
        let metrics = Arc::new(WsMetrics::default());
        let registry = Arc::new(ConnectionRegistry::new(metrics.clone()));
        let tables = Arc::new(Tables::new(config.session_limits()?));
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), tables.clone(), localizer));
        Ok(Self {
            config,
            metrics,
            registry,
            tables,
            dispatcher,
        })
    }

    /// Cancels every connection. Their handlers finish teardown on their own.
    pub fn shutdown(&self) -> usize {
        self.registry.close_all()
    }
}
