//! Service runtime.
//!
//! [`ServiceHandle`] owns the full lifecycle: database, migrations, event
//! bus, adapters, the interface manager and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::application::ports::{RealtimePublisher, SystemTimeSource, TimeSource};
use crate::application::{AtgAdapter, InterfaceManager, PtsAdapter, SharedInterfaceManager};
use crate::config::{AppConfig, MetricsSection};
use crate::domain::RepositoryProvider;
use crate::infrastructure::{init_database, run_migrations, HttpTimeSource, SeaOrmRepositoryProvider};
use crate::notifications::{create_event_bus, SharedEventBus};
use crate::shared::errors::{AppError, InfraError};
use crate::shared::shutdown::{ShutdownCoordinator, StopSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the service.
pub struct ServiceOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServiceHandle ──────────────────────────────────────────────────

/// Handle to a running telemetry service.
///
/// ```rust,no_run
/// use fuel_telemetry::server::{ServiceHandle, ServiceOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServiceHandle::start(ServiceOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServiceHandle {
    /// Real-time events for dashboards.
    pub event_bus: SharedEventBus,
    pub repos: Arc<dyn RepositoryProvider>,
    pub manager: SharedInterfaceManager,
    /// The configuration the service was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
}

impl ServiceHandle {
    /// Start the service.
    ///
    /// This will:
    /// 1. Install the Prometheus exporter (if enabled)
    /// 2. Connect to the database and run migrations
    /// 3. Build the adapters and register them with the interface manager
    /// 4. Initialize every adapter, load station mappings, start monitoring
    pub async fn start(opts: ServiceOptions) -> Result<Self, AppError> {
        let config = opts.config;
        info!("Starting fuel telemetry service...");

        install_metrics(&config.metrics);

        // ── Database ───────────────────────────────────────────
        let db = init_database(&config.database_config())
            .await
            .map_err(InfraError::from)?;
        if opts.auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await.map_err(InfraError::from)?;
            info!("Migrations completed");
        }

        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

        // ── Event Bus ──────────────────────────────────────────
        let event_bus = create_event_bus();
        info!("🔔 Event bus initialized for real-time notifications");

        // ── Adapters & manager ─────────────────────────────────
        let manager = build_manager(&config, repos.clone(), event_bus.clone());

        for outcome in manager.initialize_all().await {
            if let Some(e) = &outcome.error {
                error!(interface = %outcome.interface_code, error = %e, "Adapter failed to initialize");
            }
        }
        match manager.reload_station_mappings().await {
            Ok(count) => info!(stations = count, "🗺️ Station mappings loaded"),
            Err(e) => warn!(error = %e, "Station mappings unavailable, using default interface"),
        }
        for outcome in manager.start_all_monitoring().await {
            if let Some(e) = &outcome.error {
                error!(interface = %outcome.interface_code, error = %e, "Adapter failed to start monitoring");
            }
        }

        let shutdown = ShutdownCoordinator::new(config.service.shutdown_timeout_secs);
        info!("🚀 Telemetry service started.");

        Ok(Self {
            event_bus,
            repos,
            manager,
            config,
            db,
            shutdown,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> StopSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the shutdown signal, stop every adapter within the shutdown
    /// timeout, then close the database.
    pub async fn wait(self) {
        let manager = self.manager.clone();
        self.shutdown
            .shutdown_with_cleanup(|| async move {
                for outcome in manager.stop_all_monitoring().await {
                    if let Some(e) = &outcome.error {
                        warn!(interface = %outcome.interface_code, error = %e, "Adapter did not stop cleanly");
                    }
                }
            })
            .await;

        if let Err(e) = self.db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("✅ Database connection closed");
        }

        info!("👋 Fuel telemetry service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down fuel telemetry service...");
        self.trigger_shutdown();
        self.wait().await;
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Build the enabled adapters and the manager that routes stations to them.
pub fn build_manager(
    config: &AppConfig,
    repos: Arc<dyn RepositoryProvider>,
    publisher: Arc<dyn RealtimePublisher>,
) -> SharedInterfaceManager {
    let manager = Arc::new(InterfaceManager::new(
        &config.manager.default_interface,
        repos.clone(),
    ));

    if config.atg.enabled {
        let atg = AtgAdapter::new(config.atg.to_settings(), repos.clone(), publisher.clone());
        manager.register(Arc::new(atg));
    }
    if config.pts.enabled {
        let settings = config.pts.to_settings();
        let time_source = build_time_source(config.pts.time_source_url.as_deref(), settings.client.request_timeout);
        let pts = PtsAdapter::new(settings, repos, publisher, time_source);
        manager.register(Arc::new(pts));
    }

    for (alias, code) in &config.manager.aliases {
        manager.register_alias(alias, code);
    }
    if manager.default_service().is_none() {
        warn!(interface = %manager.default_code(), "Default interface is not registered");
    }
    manager
}

fn build_time_source(url: Option<&str>, timeout: Duration) -> Arc<dyn TimeSource> {
    let Some(url) = url else {
        return Arc::new(SystemTimeSource);
    };
    match HttpTimeSource::new(url, timeout) {
        Ok(source) => {
            info!(url, "🕒 Authoritative time source configured");
            Arc::new(source)
        }
        Err(e) => {
            warn!(url, error = %e, "Time source unusable, using host clock");
            Arc::new(SystemTimeSource)
        }
    }
}

fn install_metrics(config: &MetricsSection) {
    if !config.enabled {
        return;
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!("📊 Prometheus metrics exporter listening on http://{}", addr),
        Err(e) => warn!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServiceHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoopPublisher;
    use crate::infrastructure::InMemoryRepositoryProvider;

    #[tokio::test]
    async fn manager_resolves_configured_aliases() {
        let config = AppConfig::default();
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let manager = build_manager(&config, repos, Arc::new(NoopPublisher));

        assert_eq!(manager.resolve_code("pts").as_deref(), Some("NFPP"));
        assert_eq!(manager.resolve_code("ATG").as_deref(), Some("ATG"));
        assert!(manager.default_service().is_some());
    }

    #[tokio::test]
    async fn disabled_adapters_are_not_registered() {
        let mut config = AppConfig::default();
        config.pts.enabled = false;
        let repos: Arc<dyn RepositoryProvider> = Arc::new(InMemoryRepositoryProvider::new());
        let manager = build_manager(&config, repos, Arc::new(NoopPublisher));

        assert!(manager.get_service("NFPP").is_none());
        assert!(manager.resolve_code("PTS").is_none());
    }
}
