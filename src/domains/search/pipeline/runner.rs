//! Pipeline Runner (spec §4.3): sequences the stage chain for one Job, owns
//! the cancellation signal and heartbeat ticker, and publishes progress.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::common::geocoding::Geocoder;
use crate::common::entity_ids::RequestId;
use crate::domains::search::job_store::JobStore;
use crate::domains::search::models::{
    Assist, AssistType, BusinessStatus, Job, JobStatus, OpenNowState, PlaceResult,
    ResultSource, SearchMeta, SearchResponse,
};
use crate::domains::search::pipeline::classification::{classify, ClassificationRoute};
use crate::domains::search::pipeline::context::PipelineContext;
use crate::domains::search::pipeline::intent::route_intent;
use crate::domains::search::pipeline::missing_anchor::check_missing_anchor;
use crate::domains::search::pipeline::post_filter::{apply_post_filter, PostFilterConstraints};
use crate::domains::search::pipeline::ranking::{rank, RankingWeights};
use crate::domains::search::pipeline::route_mapping::map_route;
use crate::domains::search::pipeline::validator::sanitize;
use crate::domains::search::provider::gateway::ProviderGateway;
use crate::domains::search::provider::places_client::ProviderError;
use crate::kernel::{LanguageModel, StreamHub};

const STOP_BOOST_CONFIDENCE_FLOOR: f64 = 0.0;

pub struct RunnerConfig {
    pub deadline: Duration,
    pub heartbeat_interval: Duration,
    pub default_bias_radius_m: u32,
    /// Search-language fallback when a Job carries no `locale` — spec §4.3
    /// stage 3's "canonical query is produced in the *search* language".
    pub default_search_language: String,
}

pub struct PipelineDeps {
    pub job_store: Arc<dyn JobStore>,
    pub stream_hub: StreamHub,
    pub gateway: Arc<ProviderGateway>,
    pub geocoder: Arc<dyn Geocoder>,
    pub language_model: Arc<dyn LanguageModel>,
    pub config: RunnerConfig,
}

enum Terminal {
    Success(SearchResponse),
    Clarify(SearchResponse),
    Stopped(SearchResponse),
    Failed { code: String, message: String },
}

/// Spawns the Runner as an independent task bound to the Job's lifetime, per
/// spec §5's "many-task concurrent" scheduling model. Fire-and-forget: the
/// caller does not await this.
pub fn spawn(job: Job, deps: Arc<PipelineDeps>) {
    tokio::spawn(run(job, deps));
}

#[instrument(skip(deps, job), fields(request_id = %job.request_id))]
async fn run(job: Job, deps: Arc<PipelineDeps>) {
    let request_id = job.request_id;
    let topic = format!("search:{request_id}");

    let ctx = PipelineContext::new(
        request_id,
        job.owner_session_id,
        job.user_location,
        deps.language_model.clone(),
    );

    publish(
        &deps.stream_hub,
        &topic,
        json!({"type": "progress", "requestId": request_id.to_string(), "stage": "accepted", "progress": 0}),
    )
    .await;
    let _ = deps
        .job_store
        .set_status(request_id, JobStatus::Running, 10)
        .await;

    let heartbeat = spawn_heartbeat(request_id, deps.clone(), ctx.cancellation.clone());
    let deadline_token = ctx.cancellation.clone();
    let deadline = deps.config.deadline;

    let outcome = tokio::select! {
        result = run_stages(&job, &ctx, &deps) => result,
        _ = tokio::time::sleep(deadline) => {
            deadline_token.cancel();
            Terminal::Failed { code: "TIMEOUT".to_string(), message: "pipeline deadline exceeded".to_string() }
        }
    };

    heartbeat.abort();

    if ctx.should_abort() && !matches!(outcome, Terminal::Failed { .. }) {
        // cancelled mid-flight by something other than our own deadline
        // branch: skip journal writes and publishes per spec §4.3.
        return;
    }

    finalize(&topic, &deps, &job, outcome).await;
}

fn spawn_heartbeat(
    request_id: RequestId,
    deps: Arc<PipelineDeps>,
    cancellation: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let interval = deps.config.heartbeat_interval;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = deps.job_store.update_heartbeat(request_id).await {
                        warn!(error = %e, "heartbeat write failed, continuing");
                    }
                }
                _ = cancellation.cancelled() => break,
            }
        }
    })
}

async fn run_stages(job: &Job, ctx: &PipelineContext, deps: &Arc<PipelineDeps>) -> Terminal {
    let query = &job.query.original;

    let classification = classify(query, ctx).await;

    match classification.route {
        ClassificationRoute::Stop => {
            return Terminal::Stopped(stopped_response(job, ctx, "LOW_CONFIDENCE"));
        }
        ClassificationRoute::AskClarify => {
            return Terminal::Clarify(clarify_response(
                job,
                ctx,
                "I'm not sure what you're looking for — could you tell me more?",
                None,
                false,
            ));
        }
        ClassificationRoute::Continue => {}
    }

    if ctx.should_abort() {
        return Terminal::Failed {
            code: "TIMEOUT".to_string(),
            message: "cancelled before intent routing".to_string(),
        };
    }

    let intent = route_intent(query, &classification.language, ctx).await;

    let search_language = job
        .locale
        .as_deref()
        .unwrap_or(&deps.config.default_search_language);

    let mapping = map_route(
        query,
        &classification.language,
        search_language,
        job.region.as_deref(),
        &intent,
        ctx,
        &*deps.geocoder,
        deps.config.default_bias_radius_m,
    )
    .await;

    if let Some(anchor) = check_missing_anchor(
        &mapping,
        intent.city_hint.as_deref(),
        intent.landmark_text.as_deref(),
    ) {
        return Terminal::Clarify(clarify_response(
            job,
            ctx,
            anchor.question,
            Some(anchor.suggested_action),
            anchor.blocks_search,
        ));
    }

    if ctx.should_abort() {
        return Terminal::Failed {
            code: "TIMEOUT".to_string(),
            message: "cancelled before provider call".to_string(),
        };
    }

    let gateway_result = match deps.gateway.text_search(&mapping).await {
        Ok(result) => result,
        Err(e) => return translate_provider_error(e),
    };

    if ctx.should_abort() {
        return Terminal::Failed {
            code: "TIMEOUT".to_string(),
            message: "cancelled after provider call".to_string(),
        };
    }

    let constraints = PostFilterConstraints {
        open_now_only: job.filters.open_now_only,
        max_price_level: job.filters.max_price_level,
        min_rating: job.filters.min_rating,
    };
    let filtered = apply_post_filter(gateway_result.results, &constraints);

    let cuisine_key = job.filters.cuisine_key.as_deref();
    let open_now_requested = job.filters.open_now_only;
    let weights = RankingWeights::select(mapping.ranking_profile, ctx.user_location)
        .zero_forced(ctx.user_location, cuisine_key, open_now_requested);
    let ranked = rank(filtered, weights, ctx.user_location, cuisine_key);
    let results: Vec<PlaceResult> = ranked.into_iter().map(|r| r.place).collect();

    let response = success_response(job, ctx, results, gateway_result.served_from);
    Terminal::Success(sanitize(response))
}

fn translate_provider_error(e: ProviderError) -> Terminal {
    match e {
        ProviderError::Timeout => Terminal::Failed {
            code: "TIMEOUT".to_string(),
            message: "provider call timed out".to_string(),
        },
        ProviderError::HttpError { status } => Terminal::Failed {
            code: "SEARCH_FAILED".to_string(),
            message: format!("provider returned HTTP {status}"),
        },
        ProviderError::NetworkError(msg) => Terminal::Failed {
            code: "SEARCH_FAILED".to_string(),
            message: format!("network error calling provider: {msg}"),
        },
    }
}

fn base_meta(took_ms: u64, source: ResultSource, failure_reason: &str) -> SearchMeta {
    SearchMeta {
        took_ms,
        mode: "async".to_string(),
        applied_filters: vec![],
        confidence: STOP_BOOST_CONFIDENCE_FLOOR,
        source,
        failure_reason: failure_reason.to_string(),
        pagination: None,
        street_grouping: None,
    }
}

fn stopped_response(job: &Job, ctx: &PipelineContext, failure_reason: &str) -> SearchResponse {
    SearchResponse {
        request_id: job.request_id,
        session_id: job.owner_session_id,
        query: job.query.clone(),
        results: vec![],
        groups: None,
        chips: vec![],
        assist: Assist {
            kind: AssistType::Stopped,
            message: Some("That doesn't look like a restaurant search — try asking about food or dining.".to_string()),
            question: None,
            suggested_action: None,
            blocks_search: None,
        },
        meta: base_meta(ctx.elapsed().as_millis() as u64, ResultSource::ProviderApi, failure_reason),
    }
}

fn clarify_response(
    job: &Job,
    ctx: &PipelineContext,
    question: &str,
    suggested_action: Option<&str>,
    blocks_search: bool,
) -> SearchResponse {
    SearchResponse {
        request_id: job.request_id,
        session_id: job.owner_session_id,
        query: job.query.clone(),
        results: vec![],
        groups: None,
        chips: vec![],
        assist: Assist {
            kind: AssistType::Clarify,
            message: None,
            question: Some(question.to_string()),
            suggested_action: suggested_action.map(str::to_string),
            blocks_search: Some(blocks_search),
        },
        meta: base_meta(ctx.elapsed().as_millis() as u64, ResultSource::ProviderApi, "NONE"),
    }
}

fn success_response(
    job: &Job,
    ctx: &PipelineContext,
    results: Vec<PlaceResult>,
    source: ResultSource,
) -> SearchResponse {
    let mut meta = base_meta(ctx.elapsed().as_millis() as u64, source, "NONE");
    meta.confidence = 1.0;
    meta.pagination = Some(crate::domains::search::models::Pagination {
        page: 1,
        has_more: false,
    });

    SearchResponse {
        request_id: job.request_id,
        session_id: job.owner_session_id,
        query: job.query.clone(),
        results,
        groups: None,
        chips: vec![],
        assist: Assist::ready(),
        meta,
    }
}

async fn finalize(topic: &str, deps: &Arc<PipelineDeps>, job: &Job, outcome: Terminal) {
    let request_id = job.request_id;
    match outcome {
        Terminal::Success(response) => {
            check_terminal_invariants(job, JobStatus::DoneSuccess, Some(&response), None);
            let _ = deps.job_store.set_result(request_id, response.clone()).await;
            let _ = deps
                .job_store
                .set_status(request_id, JobStatus::DoneSuccess, 100)
                .await;
            publish(&deps.stream_hub, topic, json!({"type": "ready", "requestId": request_id.to_string()})).await;
        }
        Terminal::Clarify(response) => {
            check_terminal_invariants(job, JobStatus::DoneClarify, Some(&response), None);
            let _ = deps.job_store.set_result(request_id, response.clone()).await;
            let _ = deps
                .job_store
                .set_status(request_id, JobStatus::DoneClarify, 100)
                .await;
            publish(&deps.stream_hub, topic, json!({"type": "clarify", "requestId": request_id.to_string()})).await;
        }
        Terminal::Stopped(response) => {
            check_terminal_invariants(job, JobStatus::DoneStopped, Some(&response), None);
            let _ = deps.job_store.set_result(request_id, response.clone()).await;
            let _ = deps
                .job_store
                .set_status(request_id, JobStatus::DoneStopped, 100)
                .await;
            publish(&deps.stream_hub, topic, json!({"type": "stopped", "requestId": request_id.to_string()})).await;
        }
        Terminal::Failed { code, message } => {
            let error = crate::domains::search::models::JobError {
                code: code.clone(),
                message: message.clone(),
            };
            check_terminal_invariants(job, JobStatus::DoneFailed, None, Some(&error));
            let _ = deps
                .job_store
                .set_error(request_id, code.clone(), message.clone())
                .await;
            let _ = deps
                .job_store
                .set_status(request_id, JobStatus::DoneFailed, 100)
                .await;
            publish(
                &deps.stream_hub,
                topic,
                json!({"type": "error", "requestId": request_id.to_string(), "code": code}),
            )
            .await;
        }
    }
    info!(request_id = %request_id, "pipeline run finished");
}

/// Builds a transient snapshot of the Job at its terminal state and runs
/// `Job::check_invariants` over it, logging but never blocking on a
/// violation — the snapshot itself is never persisted.
fn check_terminal_invariants(
    job: &Job,
    status: JobStatus,
    result: Option<&SearchResponse>,
    error: Option<&crate::domains::search::models::JobError>,
) {
    let snapshot = Job {
        status,
        result: result.cloned(),
        error: error.cloned(),
        updated_at: Utc::now(),
        ..job.clone()
    };
    let violations = snapshot.check_invariants();
    if !violations.is_empty() {
        warn!(request_id = %job.request_id, ?violations, "terminal job invariant violation");
    }
}

/// Fire-and-forget: a publish failure never affects the Job's terminal
/// status. `StreamHub::publish` already swallows send errors; this wrapper
/// exists so a future richer publisher (e.g. one that can itself error) can
/// be dropped in without touching call sites.
async fn publish(hub: &StreamHub, topic: &str, value: serde_json::Value) {
    hub.publish(topic, value).await;
}
