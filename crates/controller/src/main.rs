//! Recommendation Controller
//!
//! Reconciles recommendation resources: decides when each one should be
//! recomputed and keeps its status converged on the latest result.

use anyhow::Result;
use controller_lib::{
    controller::ControllerBuilder,
    driver::ResyncDriver,
    events::TracingEventRecorder,
    health::{components, HealthRegistry},
    observability::{ControllerMetrics, StructuredLogger},
    predictor::PredictorRegistry,
    provider::{StaticMetricsProvider, StaticScaleClient},
    recommender::{DefaultRecommenderFactory, RecommenderContext},
    store::InMemoryStore,
};
use recommendation_controller::{api, config::ControllerConfig, seed::SeedData};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CONTROLLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting recommendation-controller");

    let config = ControllerConfig::load()?;
    info!(
        api_port = config.api_port,
        resync_secs = config.resync_period_secs,
        "Controller configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::RECOMMENDER).await;
    health_registry.register(components::DRIVER).await;

    let registry = prometheus::Registry::new();
    let metrics = ControllerMetrics::new(&registry)?;
    let logger = StructuredLogger::new("recommendation");

    let store = Arc::new(InMemoryStore::new());
    let provider = StaticMetricsProvider::new();
    let scale = StaticScaleClient::new();
    let seeded = match &config.seed_path {
        Some(path) => SeedData::load(path)?.apply(&store, &provider, &scale),
        None => 0,
    };

    let factory = DefaultRecommenderFactory::new(RecommenderContext {
        predictors: PredictorRegistry::with_defaults(),
        provider: Arc::new(provider),
        scale_client: Arc::new(scale),
        config_set: config.config_set.clone(),
    });

    let controller = ControllerBuilder::new()
        .store(store.clone())
        .factory(Arc::new(factory))
        .recorder(Arc::new(TracingEventRecorder))
        .error_fallback_period(config.error_fallback())
        .metrics(metrics)
        .logger(logger.clone())
        .build()?;

    let driver = Arc::new(ResyncDriver::new(
        Arc::new(controller),
        store,
        health_registry.clone(),
        config.driver_config(),
    ));

    logger.log_startup(CONTROLLER_VERSION, seeded);

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), registry));
    health_registry.set_ready(true).await;

    let shutdown = CancellationToken::new();
    let driver_handle = tokio::spawn(driver.run(shutdown.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
            }
        }
    }

    health_registry.set_ready(false).await;
    shutdown.cancel();
    if let Err(e) = driver_handle.await {
        error!(error = %e, "Resync driver task failed");
    }
    info!("Shutting down");

    Ok(())
}
