//! Application wiring: shared state, router assembly, middleware layering.

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::common::geocoding::Geocoder;
use crate::config::Config;
use crate::domains::search::job_store::JobStore;
use crate::domains::search::pipeline::{PipelineDeps, RunnerConfig};
use crate::domains::search::provider::ProviderGateway;
use crate::kernel::{KvStore, LanguageModel, StreamHub};
use crate::server::middleware::{extract_client_ip, populate_session};
use crate::server::routes;

/// Contract version advertised in async responses and event frames.
pub const CONTRACTS_VERSION: &str = "v1";

#[derive(Clone)]
pub struct AppState {
    pub job_store: Arc<dyn JobStore>,
    pub stream_hub: StreamHub,
    pub gateway: Arc<ProviderGateway>,
    pub geocoder: Arc<dyn Geocoder>,
    pub language_model: Arc<dyn LanguageModel>,
    pub photo_cache: Arc<dyn KvStore>,
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn pipeline_deps(&self) -> Arc<PipelineDeps> {
        Arc::new(PipelineDeps {
            job_store: self.job_store.clone(),
            stream_hub: self.stream_hub.clone(),
            gateway: self.gateway.clone(),
            geocoder: self.geocoder.clone(),
            language_model: self.language_model.clone(),
            config: RunnerConfig {
                deadline: self.config.pipeline_deadline,
                heartbeat_interval: self.config.pipeline_heartbeat_interval,
                default_bias_radius_m: self.config.default_bias_radius_m,
                default_search_language: self.config.default_search_language.clone(),
            },
        })
    }
}

pub fn build_app(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST])
    };

    let v1 = Router::new()
        .route("/search", post(routes::search::submit_search))
        .route("/search/{request_id}/result", get(routes::search::get_result))
        .route("/stream/assistant/{request_id}", get(routes::stream::stream_assistant))
        .route(
            "/photos/places/{place_id}/photos/{photo_id}",
            get(routes::photos::get_photo),
        );

    #[cfg(not(debug_assertions))]
    let v1 = {
        use std::sync::Arc as StdArc;
        use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

        let photo_rate_limit = StdArc::new(
            GovernorConfigBuilder::default()
                .per_second(1)
                .burst_size(60)
                .use_headers()
                .finish()
                .expect("rate limiter configuration is valid"),
        );
        v1.layer(GovernorLayer {
            config: photo_rate_limit,
        })
    };

    let legacy_sunset = state.config.legacy_sunset.clone();
    let legacy = v1.clone().layer(middleware::from_fn(move |request, next| {
        legacy_deprecation_headers(legacy_sunset.clone(), request, next)
    }));

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .nest("/api/v1", v1)
        .nest("/api", legacy)
        .layer(middleware::from_fn(populate_session))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Marks every response on the legacy `/api` mount per RFC 8594: a stable
/// `Deprecation` flag plus a `Sunset` date after which the mount may be
/// removed.
async fn legacy_deprecation_headers(
    sunset: String,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::header::HeaderName;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("deprecation"), HeaderValue::from_static("true"));
    if let Ok(value) = HeaderValue::from_str(&sunset) {
        headers.insert(HeaderName::from_static("sunset"), value);
    }
    response
}
