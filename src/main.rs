use pathopt_app::adapters::inbound::{router, AppState};
use pathopt_app::adapters::outbound::{
    init_combined_logger, BroadcastHub, PolylineCostFactory, RandomSearchOptimizer,
};
use pathopt_app::application::OptimizationService;
use pathopt_app::Config;
use std::error::Error;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::load().await?;

    // `log` is left to fast_log, so install the subscriber without LogTracer.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting path optimization server");

    let logger = init_combined_logger(config.logging.file.as_deref(), &config.logging.level);
    let hub = Arc::new(BroadcastHub::new(config.server.event_capacity));
    let service = Arc::new(OptimizationService::assemble(
        &config.coordinator,
        Arc::new(RandomSearchOptimizer::default()),
        Arc::new(PolylineCostFactory::default()),
        hub.clone(),
        logger,
    ));

    let app = router(AppState::new(service.clone(), hub));
    let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down; stopping current optimization");
    service.stop_optimization().await;
    Ok(())
}
