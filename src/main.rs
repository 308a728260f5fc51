use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use poi_recommender::{
    api::{create_router, AppState},
    config::Config,
    dataset::Dataset,
    services::Recommender,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("poi_recommender=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.engine_settings();
    tracing::info!(
        dataset = %config.dataset_path,
        cluster_seed = settings.cluster_seed,
        sample_fraction = settings.sample_fraction,
        location_metric = ?settings.location_metric,
        cache_derived = settings.cache_derived,
        "Starting recommender"
    );

    // Loaded once; the engine only ever reads it
    let dataset = Dataset::load(&config.dataset_path)?;
    let state = AppState::new(Recommender::new(Arc::new(dataset), settings));

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(%address, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
