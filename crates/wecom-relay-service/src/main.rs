//! # WeCom Relay Service
//!
//! Binary entry point for the WeCom callback relay.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Builds the callback secrets and the Telegram sink
//! - Starts the HTTP server from wecom-relay-api

mod sink;

use sink::TelegramSink;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wecom_relay_api::{start_server, LoggingConfig, ServiceConfig};
use wecom_relay_core::CallbackCrypto;

const CONFIG_FILE_ENV: &str = "WECOM_RELAY_CONFIG_FILE";
const ENV_PREFIX: &str = "WECOM_RELAY";
const EXIT_CONFIGURATION: i32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration decides the log format, so it is loaded first and any
    // error is reported once logging is up.
    let loaded = load_config();
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting WeCom Relay Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(
                error = %e,
                "Could not load service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(EXIT_CONFIGURATION);
    }

    let crypto = match CallbackCrypto::new(
        service_config.wecom.token.clone(),
        &service_config.wecom.encoding_aes_key,
        service_config.wecom.corp_id.clone(),
    ) {
        Ok(crypto) => Arc::new(crypto),
        Err(e) => {
            error!(error = %e, "Invalid WeCom key material; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    let sink = match TelegramSink::from_config(&service_config.telegram) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!(error = %e, "Failed to build Telegram client; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        endpoint = %service_config.wecom.endpoint_path,
        corp_id = %service_config.wecom.corp_id,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, crypto, sink).await {
        error!(error = %e, "Server terminated with an error");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Build the layered service configuration.
///
/// Sources (applied in order, later sources override earlier ones):
///  1. `/etc/wecom-relay/service.yaml`: system-wide defaults
///  2. `./config/service.yaml`: deployment-local override
///  3. Path given by `WECOM_RELAY_CONFIG_FILE`: operator-specified file
///  4. Environment variables prefixed `WECOM_RELAY__`, with `__` separating
///     sections, e.g. `WECOM_RELAY__SERVER__PORT=9090`
///
/// Absent files are skipped. A malformed file or an environment variable
/// that cannot be coerced to the right type is a hard error.
fn load_config() -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/wecom-relay/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var(CONFIG_FILE_ENV) {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
