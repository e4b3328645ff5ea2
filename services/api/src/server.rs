use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryGsRepository, InMemoryMeetingService, LoggingNotificationService,
};
use crate::routes::with_gs_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gs_assessment::config::AppConfig;
use gs_assessment::error::AppError;
use gs_assessment::telemetry;
use gs_assessment::workflows::gs::StageController;
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

    let controller = Arc::new(StageController::new(
        Arc::new(InMemoryGsRepository::default()),
        Arc::new(LoggingNotificationService),
        Arc::new(InMemoryMeetingService::default()),
        config.workflow.clone(),
    ));

    let app = with_gs_routes(controller)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        demo_mode = config.workflow.demo_mode,
        "gs assessment service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
