//! Fuel telemetry service — CLI
//!
//! ```sh
//! # Run with default config (~/.config/fuel-telemetry/config.toml)
//! fuel-telemetry
//!
//! # Validate config without starting
//! fuel-telemetry check
//!
//! # One detector pass (for cron)
//! fuel-telemetry detect --date 2024-01-15
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use fuel_telemetry::application::RefillAnomalyDetector;
use fuel_telemetry::config::AppConfig;
use fuel_telemetry::domain::RepositoryProvider;
use fuel_telemetry::server::{init_tracing, ServiceHandle, ServiceOptions};
use fuel_telemetry::{default_config_path, init_database, SeaOrmRepositoryProvider};

/// Fuel station device-interface service.
#[derive(Parser, Debug)]
#[command(
    name = "fuel-telemetry",
    version,
    about = "Tank gauge and forecourt controller telemetry service",
    long_about = "Polls ATG serial gauges and jsonPTS controllers, stores readings and \
                  transactions, and detects refills and overnight losses.\n\n\
                  Default config: ~/.config/fuel-telemetry/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "FUEL_TELEMETRY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start polling every configured interface (default).
    Run {
        /// Skip database migrations on startup.
        #[arg(long)]
        no_migrate: bool,
    },
    /// Validate the configuration file and exit.
    Check,
    /// Run refill and anomaly detection once.
    Detect {
        /// Only this tank's refill events.
        #[arg(long)]
        tank: Option<i32>,
        /// Only this station's tanks.
        #[arg(long)]
        station: Option<i32>,
        /// Anomaly date (UTC, YYYY-MM-DD); defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let command = cli.command.unwrap_or(Command::Run { no_migrate: false });

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if matches!(command, Command::Check) {
                eprintln!("❌ Invalid configuration in {}: {}", config_path.display(), e);
                std::process::exit(1);
            }
            eprintln!("Failed to load config from {}: {}. Using defaults.", config_path.display(), e);
            AppConfig::default()
        }
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    match command {
        Command::Check => {
            println!("✅ Configuration is valid");
            println!("   Config file : {}", config_path.display());
            println!("   Database    : {}", config.database.url);
            println!("   Log level   : {}", config.logging.level);
            println!("   Default     : {}", config.manager.default_interface);
            if config.atg.enabled {
                println!("   ATG         : {} @ {} baud", config.atg.port, config.atg.baud_rate);
            }
            if config.pts.enabled {
                println!("   PTS         : {}", config.pts.base_url);
            }
            Ok(())
        }
        Command::Run { no_migrate } => {
            init_tracing(&config);
            info!("Configuration loaded from {}", config_path.display());

            let handle = ServiceHandle::start(ServiceOptions {
                config,
                auto_migrate: !no_migrate,
            })
            .await?;
            handle.install_signal_handler();
            info!("🚀 Press Ctrl+C to shutdown gracefully.");
            handle.wait().await;
            Ok(())
        }
        Command::Detect { tank, station, date } => {
            init_tracing(&config);
            let db = init_database(&config.database_config()).await?;
            let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
            let detector = RefillAnomalyDetector::new(repos, config.detector.to_settings());

            let refills = match tank {
                Some(tank_id) => detector.detect_refill_events(tank_id).await?,
                None => detector.detect_all_refill_events(station).await?,
            };
            info!(count = refills.len(), "Refill detection finished");

            if tank.is_none() {
                match detector.detect_daily_anomalies(station, date).await {
                    Ok(alerts) => info!(count = alerts.len(), "Anomaly detection finished"),
                    Err(e) => error!(error = %e, "Anomaly detection failed"),
                }
            }

            db.close().await?;
            Ok(())
        }
    }
}
