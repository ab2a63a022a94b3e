//! Process wiring: tracing, store selection, scheduler boot and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use postforge_api::{ApiConfig, ApiServer, AppState, IdentityVerifier};
use postforge_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig, StoreBackend, StoreConfig};
use postforge_generation_http::HttpGenerationService;
use postforge_scheduler::{
    CronRegistry, EmergencyController, ExecutionRunner, JobStore, MemoryJobStore, RunPolicy,
    Scheduler, TriggerGate,
};
use postforge_store_sqlite::SqliteJobStore;

/// Initialize tracing with console and optional file output.
///
/// `RUST_LOG` overrides `logging.level`. When `logging.directory` is set, logs
/// are also written there with daily rotation.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.directory {
        Some(dir) => {
            let log_dir = ConfigLoader::expand_path(dir);
            std::fs::create_dir_all(&log_dir)?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("postforge")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // The worker flushes only while its guard is alive.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

/// Validate `config`, printing warnings. Errors abort.
pub(crate) fn check_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        warn!("Config warning at {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        return Err(format!("Invalid configuration: {}", result.error_summary()).into());
    }
    Ok(())
}

async fn open_store(
    config: &StoreConfig,
) -> Result<Arc<dyn JobStore>, Box<dyn std::error::Error>> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory job store; jobs will not survive a restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = config
                .path
                .as_deref()
                .map(ConfigLoader::expand_path)
                .ok_or("store.path is required for the sqlite backend")?;
            info!("Opening job store at {}", path.display());
            Ok(Arc::new(SqliteJobStore::open(&path).await?))
        }
    }
}

/// Run the scheduler and control server until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting postforge v{}", env!("CARGO_PKG_VERSION"));
    check_config(&config)?;

    let gate = Arc::new(TriggerGate::from_names(&config.gate.allowed_sources)?);
    let store = open_store(&config.store).await?;
    let registry = Arc::new(CronRegistry::new());

    let mut generation = HttpGenerationService::new(config.generation.endpoint.clone());
    if let Some(key) = &config.generation.api_key {
        generation = generation.with_api_key(key.clone());
    }

    let policy = RunPolicy {
        failure_threshold: config.scheduler.failure_threshold,
        run_timeout: Duration::from_secs(config.scheduler.run_timeout_secs),
    };
    let drain_timeout = Duration::from_secs(config.scheduler.drain_timeout_secs);

    let runner = Arc::new(ExecutionRunner::new(
        store,
        registry,
        gate,
        Arc::new(generation),
        policy,
    ));
    let scheduler = Arc::new(Scheduler::new(runner.clone()));
    let emergency = Arc::new(EmergencyController::new(runner, drain_timeout));

    let boot = scheduler.initialize_from_store().await?;
    info!(
        armed = boot.armed.len(),
        skipped = boot.skipped.len(),
        "Scheduler initialized from store"
    );
    for (job_id, reason) in &boot.skipped {
        warn!(job_id, reason = %reason, "Active job not armed at boot");
    }

    let identity = IdentityVerifier::new(
        config.gate.control_token.clone(),
        config.gate.webhook_secret.clone(),
    );
    let state = Arc::new(AppState::new(scheduler.clone(), emergency, identity));
    let server = ApiServer::new(
        ApiConfig::new(config.server.host.clone(), config.server.port),
        state,
    );

    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await;

    if !scheduler.shutdown(drain_timeout).await {
        warn!("In-flight runs were still active at exit");
    }
    result
}
