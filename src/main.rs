use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use testrun_actors::actors::{
    CompositeMessageListener, MessageListener, TracingFailureLogger, TracingMessageListener,
};
use testrun_actors::config::DaemonConfig;
use testrun_actors::daemon::{Daemon, ProcessTestClassRunner};
use testrun_actors::metrics::{Metrics, MetricsFailureHandler, MetricsMessageListener};

fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=testrun_actors=trace testrun-daemon 40123
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,testrun_actors=debug"))
        )
        .init();

    let config = DaemonConfig::from_args(std::env::args())?;
    tracing::info!(launcher_port = config.launcher_port, "🚀 Starting test run daemon");

    let metrics = Arc::new(Metrics::new()?);
    let hooks: Vec<Arc<dyn MessageListener>> = vec![
        Arc::new(MetricsMessageListener::new(metrics.clone())),
        Arc::new(TracingMessageListener),
    ];
    let listener = Arc::new(CompositeMessageListener::new(hooks));
    let failures = Arc::new(MetricsFailureHandler::new(
        metrics.clone(),
        Arc::new(TracingFailureLogger),
    ));

    let daemon = Daemon::start(&config, Arc::new(ProcessTestClassRunner::new()), listener, failures)?;
    daemon.wait_for_exit();

    let report = daemon.shutdown();
    tracing::debug!(snapshot = %metrics.encode_text()?, "📊 Final metrics");

    if !report.is_complete() {
        tracing::warn!(
            lingering_threads = ?report.lingering_threads,
            lingering_workers = report.lingering_workers,
            "Exiting with work still running"
        );
    }
    tracing::info!("👋 Daemon exiting");
    Ok(())
}
