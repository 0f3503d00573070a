use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryNotificationSink, InMemoryPropertyDirectory, SandboxGateway, SandboxRenderer,
};
use crate::routes::with_lifecycle_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use rentflow::config::AppConfig;
use rentflow::error::AppError;
use rentflow::lifecycle::ledger::memory::InMemoryLedger;
use rentflow::lifecycle::router::LifecycleServices;
use rentflow::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let ledger = Arc::new(InMemoryLedger::new());
    let gateway = Arc::new(SandboxGateway::default());
    let directory = Arc::new(InMemoryPropertyDirectory::default());
    let notifier = Arc::new(InMemoryNotificationSink::default());
    let renderer = Arc::new(SandboxRenderer::default());
    let services = Arc::new(LifecycleServices::new(
        ledger,
        gateway,
        directory.clone(),
        notifier,
        renderer,
        &config.payments,
    ));

    let app = with_lifecycle_routes(services)
        .layer(Extension(app_state))
        .layer(Extension(directory))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lease lifecycle orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
