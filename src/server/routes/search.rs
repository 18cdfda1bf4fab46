//! `POST /search`, `GET /search/:requestId/result` (spec §6).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::common::entity_ids::RequestId;
use crate::common::errors::ApiError;
use crate::common::geocoding::coarsen_coords;
use crate::common::hashing::hash_identity;
use crate::domains::auth::authorization::authorize_job_access;
use crate::domains::auth::session::extract_session_id;
use crate::domains::search::dedup::{self, DedupReason};
use crate::domains::search::models::{Job, JobStatus, QueryInfo, SearchFilters};
use crate::domains::search::pipeline::runner;
use crate::domains::search::provider::cache::PIPELINE_VERSION;
use crate::server::app::{AppState, CONTRACTS_VERSION};
use crate::server::middleware::ClientIp;

#[derive(Debug, Deserialize)]
pub struct SearchRequestBody {
    pub query: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub filters: SearchFilters,
}

/// spec §3's `idempotencyKey`: a deterministic hash of the normalized query,
/// locale, region, coarsened user coordinates, filter set, and pipeline
/// version. Session id deliberately does not participate — two sessions
/// submitting byte-identical search parameters are meant to dedup together.
fn compute_idempotency_key(
    query: &str,
    locale: Option<&str>,
    region: Option<&str>,
    coordinates: Option<(f64, f64)>,
    filters: &SearchFilters,
) -> String {
    let coordinates = coordinates
        .map(|(lat, lng)| format!("{lat:.2},{lng:.2}"))
        .unwrap_or_default();
    let filters = serde_json::to_string(filters).unwrap_or_default();
    hash_identity(&format!(
        "{}|{}|{}|{}|{}|{}",
        query.trim().to_lowercase(),
        locale.unwrap_or(""),
        region.unwrap_or(""),
        coordinates,
        filters,
        PIPELINE_VERSION,
    ))
}

#[derive(Debug, Serialize)]
pub struct SearchAccepted {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(rename = "resultUrl")]
    pub result_url: String,
    #[serde(rename = "contractsVersion")]
    pub contracts_version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SearchPending {
    pub status: JobStatus,
    pub progress: u8,
}

fn result_url(request_id: RequestId) -> String {
    format!("/api/v1/search/{request_id}/result")
}

pub async fn submit_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    client_ip: Option<Extension<ClientIp>>,
    Json(body): Json<SearchRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = extract_session_id(&headers)?;

    let query = body.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("query must not be empty".to_string()));
    }

    let user_location = match (body.latitude, body.longitude) {
        (Some(lat), Some(lng)) => Some(coarsen_coords(lat, lng)),
        _ => None,
    };

    let idempotency_key = compute_idempotency_key(
        query,
        body.locale.as_deref(),
        body.region.as_deref(),
        user_location,
        &body.filters,
    );

    let candidate = state.job_store.find_by_idempotency_key(&idempotency_key).await;
    let decision = dedup::decide(
        candidate.as_ref(),
        Utc::now(),
        state.config.heartbeat_window,
        state.config.running_max_age,
    );

    tracing::info!(
        session_hash = %hash_identity(&session_id.to_string()),
        client_ip_hash = %client_ip
            .as_ref()
            .map(|Extension(ClientIp(ip))| hash_identity(&ip.to_string()))
            .unwrap_or_default(),
        reason = decision.reason.as_str(),
        "search dedup decision"
    );

    if decision.reuse {
        if let Some(job) = decision.job {
            return Ok((
                StatusCode::ACCEPTED,
                Json(SearchAccepted {
                    request_id: job.request_id,
                    result_url: result_url(job.request_id),
                    contracts_version: CONTRACTS_VERSION,
                }),
            ));
        }
    }

    let now = Utc::now();
    let job = Job::builder()
        .request_id(RequestId::new())
        .owner_session_id(session_id)
        .idempotency_key(idempotency_key)
        .created_at(now)
        .updated_at(now)
        .query(QueryInfo {
            original: query.to_string(),
            language: None,
        })
        .locale(body.locale)
        .region(body.region)
        .user_location(user_location)
        .filters(body.filters)
        .build();

    let request_id = job.request_id;
    state
        .job_store
        .create(job.clone())
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!(e)))?;

    runner::spawn(job, state.pipeline_deps());

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchAccepted {
            request_id,
            result_url: result_url(request_id),
            contracts_version: CONTRACTS_VERSION,
        }),
    ))
}

pub async fn get_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = extract_session_id(&headers)?;
    let request_id = RequestId::parse(&request_id).map_err(|_| ApiError::NotFound)?;

    let job = state.job_store.get(request_id).await.ok_or(ApiError::NotFound)?;
    let job = authorize_job_access(job, session_id)?;

    match job.status {
        JobStatus::DoneSuccess | JobStatus::DoneClarify | JobStatus::DoneStopped => {
            let response = job.result.ok_or(ApiError::NotFound)?;
            Ok((StatusCode::OK, Json(response)).into_response())
        }
        JobStatus::DoneFailed => {
            let error = job.error.unwrap_or_else(|| crate::domains::search::models::JobError {
                code: "SEARCH_FAILED".to_string(),
                message: "search failed".to_string(),
            });
            Ok(ApiError::JobFailed(format!("{}: {}", error.code, error.message)).into_response())
        }
        JobStatus::Pending | JobStatus::Running => Ok((
            StatusCode::ACCEPTED,
            Json(SearchPending {
                status: job.status,
                progress: job.progress,
            }),
        )
            .into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_url_is_versioned() {
        let id = RequestId::new();
        assert!(result_url(id).starts_with("/api/v1/search/"));
    }

    #[test]
    fn idempotency_key_is_stable_for_identical_inputs() {
        let filters = SearchFilters::default();
        let a = compute_idempotency_key("pizza", Some("en"), Some("US"), Some((32.08, 34.78)), &filters);
        let b = compute_idempotency_key("pizza", Some("en"), Some("US"), Some((32.08, 34.78)), &filters);
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_ignores_case_and_surrounding_whitespace() {
        let filters = SearchFilters::default();
        let a = compute_idempotency_key("Pizza", None, None, None, &filters);
        let b = compute_idempotency_key("pizza", None, None, None, &filters);
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_changes_with_coordinates() {
        let filters = SearchFilters::default();
        let a = compute_idempotency_key("pizza", None, None, Some((32.08, 34.78)), &filters);
        let b = compute_idempotency_key("pizza", None, None, Some((40.71, -74.00)), &filters);
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_changes_with_filters() {
        let a = compute_idempotency_key("pizza", None, None, None, &SearchFilters::default());
        let b = compute_idempotency_key(
            "pizza",
            None,
            None,
            None,
            &SearchFilters {
                open_now_only: true,
                ..Default::default()
            },
        );
        assert_ne!(a, b);
    }
}
