//! `GET /stream/assistant/:requestId` (SSE) — spec §4.6's orchestrator:
//! authorize, emit `meta`, then either synthesize `done` immediately for an
//! already-terminal job, or poll until terminal (or timeout) emitting
//! narration then the summary/clarify/failure frame, then `done`.

use std::convert::Infallible;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};

use crate::common::entity_ids::RequestId;
use crate::common::errors::ApiError;
use crate::domains::auth::authorization::authorize_job_access;
use crate::domains::auth::session::extract_session_id;
use crate::domains::search::models::{Assist, Job, JobStatus};
use crate::domains::search::job_store::JobStore;
use crate::server::app::{AppState, CONTRACTS_VERSION};
use std::sync::Arc;

enum OrchestratorState {
    Meta(Job),
    NarrationOrTerminal(Job, Instant),
    Polling(Job, Instant),
    Terminal(Job),
    Done,
    Finished,
}

pub async fn stream_assistant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session_id = extract_session_id(&headers)?;
    let request_id = RequestId::parse(&request_id).map_err(|_| ApiError::NotFound)?;

    let job = state.job_store.get(request_id).await.ok_or(ApiError::NotFound)?;
    let job = authorize_job_access(job, session_id)?;

    let job_store = state.job_store.clone();
    let poll_interval = state.config.sse_poll_interval;
    let timeout = state.config.sse_timeout;

    let stream = stream::unfold(OrchestratorState::Meta(job), move |current| {
        let job_store = job_store.clone();
        async move { advance(current, job_store, poll_interval, timeout).await }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn advance(
    current: OrchestratorState,
    job_store: Arc<dyn JobStore>,
    poll_interval: std::time::Duration,
    timeout: std::time::Duration,
) -> Option<(Result<Event, Infallible>, OrchestratorState)> {
    match current {
        OrchestratorState::Meta(job) => {
            let event = frame(&job, "meta", "meta");
            let next = if job.status.is_terminal() {
                OrchestratorState::Terminal(job)
            } else {
                OrchestratorState::NarrationOrTerminal(job, Instant::now())
            };
            Some((Ok(event), next))
        }
        OrchestratorState::NarrationOrTerminal(job, started) => {
            let event = frame(&job, "narration", "narration");
            Some((Ok(event), OrchestratorState::Polling(job, started)))
        }
        OrchestratorState::Polling(job, started) => {
            if started.elapsed() > timeout {
                let event = frame(&job, "error", "timeout");
                return Some((Ok(event), OrchestratorState::Done));
            }

            tokio::time::sleep(poll_interval).await;
            let refreshed = job_store.get(job.request_id).await.unwrap_or(job);

            if refreshed.status.is_terminal() {
                Some((
                    Ok(frame(&refreshed, "progress", "polling")),
                    OrchestratorState::Terminal(refreshed),
                ))
            } else {
                Some((
                    Ok(frame(&refreshed, "progress", "polling")),
                    OrchestratorState::Polling(refreshed, started),
                ))
            }
        }
        OrchestratorState::Terminal(job) => {
            let event_type = match job.status {
                JobStatus::DoneFailed => "error",
                _ => "message",
            };
            Some((Ok(frame(&job, event_type, "terminal")), OrchestratorState::Done))
        }
        OrchestratorState::Done => Some((
            Ok(Event::default().event("done").data("{}")),
            OrchestratorState::Finished,
        )),
        OrchestratorState::Finished => None,
    }
}

fn frame(job: &Job, event_type: &'static str, stage: &'static str) -> Event {
    let mut payload = serde_json::json!({
        "channel": format!("search:{}", job.request_id),
        "contractsVersion": CONTRACTS_VERSION,
        "type": event_type,
        "requestId": job.request_id.to_string(),
        "ts": chrono::Utc::now().to_rfc3339(),
        "stage": stage,
    });

    if let Some(error) = &job.error {
        let assist = Assist::error(error.message.clone());
        if let (Some(obj), Ok(assist_value)) = (payload.as_object_mut(), serde_json::to_value(&assist)) {
            obj.insert("assist".to_string(), assist_value);
        }
    }

    Event::default()
        .event(event_type)
        .json_data(&payload)
        .unwrap_or_else(|_| Event::default().event(event_type).data("{}"))
}
