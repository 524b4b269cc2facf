use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use shared_types::MonitorTarget;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slot_tracker::client::UpstreamClient;
use slot_tracker::config::TrackerConfig;
use slot_tracker::http::{HttpTransport, ReqwestTransport};
use slot_tracker::monitor::Monitor;
use slot_tracker::notifier::Notifier;
use slot_tracker::reporter::ErrorReporter;
use slot_tracker::scheduler::MinuteScheduler;
use slot_tracker::session::SessionManager;
use slot_tracker::store::SnapshotStore;
use slot_tracker::throttle::ErrorThrottle;
use slot_tracker::watcher::watch_credential_source;

/// Watch a department or a doctor for open appointment slots.
#[derive(Parser, Debug)]
#[command(
    name = "slot-tracker",
    version,
    after_help = "Examples:\n  slot-tracker 1001_1_1207        watch a department\n  slot-tracker 1001_1_1207_1322   watch one doctor\n\n\
                  The source credential is read from OpenID_LinkingCloud in .env."
)]
struct Cli {
    /// Department code (3 segments) or doctor code (4 segments)
    code: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(target) = cli.code.as_deref().and_then(MonitorTarget::parse) else {
        Cli::command().print_help()?;
        return Ok(());
    };

    dotenvy::dotenv().ok();
    let config = TrackerConfig::from_env()?;

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);

    let throttle =
        Arc::new(ErrorThrottle::load(config.error_log_path(), config.error_cooldown).await);
    let notifier = Arc::new(Notifier::from_config(&config, transport.clone()));
    let reporter = Arc::new(ErrorReporter::new(throttle, notifier.clone()));
    let session = Arc::new(SessionManager::new(
        transport.clone(),
        &config.base_url,
        config.source_credential.clone(),
    ));
    let client = Arc::new(UpstreamClient::new(
        transport,
        session.clone(),
        reporter.clone(),
        &config.base_url,
    ));
    let monitor = Arc::new(Monitor::new(
        client,
        SnapshotStore::new(&config.state_dir),
        notifier,
        reporter.clone(),
        config.notify_haji_only,
    ));

    match session.get_credential().await {
        Ok(_) => tracing::info!("Logged in, starting checks"),
        Err(e) => {
            reporter.report("initialization error", &e).await;
            if e.is_fatal() {
                return Err(e).context("Initialization failed");
            }
            tracing::warn!("Initial login failed, will retry on the next check");
        }
    }

    // Dropping the watcher stops it
    let _watcher = match watch_credential_source(config.env_file.clone(), session) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!("Credential reload disabled: {:#}", e);
            None
        }
    };

    monitor.refresh_catalog().await;

    tracing::info!(
        "Watching {} {}",
        target.kind_label(),
        monitor.names().display_name(target.code())
    );

    let scheduler = MinuteScheduler::new();
    let task = {
        let monitor = monitor.clone();
        move || {
            let monitor = monitor.clone();
            let target = target.clone();
            async move {
                monitor.run(&target).await;
            }
        }
    };

    tokio::select! {
        _ = scheduler.run(task) => {}
        result = signal::ctrl_c() => {
            result?;
            tracing::info!("Shutdown signal received, stopping...");
        }
    }

    Ok(())
}
