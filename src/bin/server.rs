//! Places Search Server entry point.
//!
//! Loads configuration, wires concrete implementations behind the
//! collaborator traits, and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use places_search_server::common::geocoding::NominatimGeocoder;
use places_search_server::config::Config;
use places_search_server::domains::search::job_store::InMemoryJobStore;
use places_search_server::domains::search::provider::{PlacesClient, ProviderGateway};
use places_search_server::kernel::{ClaudeClient, InMemoryKvStore, StreamHub, TieredKvStore};
use places_search_server::server::{build_app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PHOTO_CACHE_L1_CAPACITY: u64 = 4096;
const PHOTO_CACHE_L1_TTL: Duration = Duration::from_secs(3600);
const PROVIDER_CACHE_L1_CAPACITY: u64 = 4096;
const PROVIDER_CACHE_L1_TTL: Duration = Duration::from_secs(900);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,places_search_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .init();

    tracing::info!("Starting Places Search Server");

    let config = Config::from_env()?;

    let language_model = Arc::new(ClaudeClient::new(config.language_model_api_key.clone()));
    let places_client = Arc::new(PlacesClient::new(
        config.places_api_key.clone(),
        config.provider_call_timeout,
    )?);
    let geocoder = Arc::new(NominatimGeocoder::new()?);

    let provider_cache = Arc::new(TieredKvStore::new(
        Arc::new(InMemoryKvStore::new()),
        PROVIDER_CACHE_L1_CAPACITY,
        PROVIDER_CACHE_L1_TTL,
    ));
    let gateway = Arc::new(ProviderGateway::new(
        places_client,
        provider_cache,
        config.provider_max_results,
        config.cache_wrap_timeout,
    ));

    let photo_cache = Arc::new(TieredKvStore::new(
        Arc::new(InMemoryKvStore::new()),
        PHOTO_CACHE_L1_CAPACITY,
        PHOTO_CACHE_L1_TTL,
    ));

    let http_client = reqwest::Client::builder()
        .timeout(config.provider_call_timeout)
        .build()
        .context("failed to build shared HTTP client")?;

    let state = AppState {
        job_store: Arc::new(InMemoryJobStore::new()),
        stream_hub: StreamHub::new(),
        gateway,
        geocoder,
        language_model,
        photo_cache,
        http_client,
        config: Arc::new(config.clone()),
    };

    let app = build_app(state, Vec::new());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
