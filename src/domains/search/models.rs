use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::entity_ids::{RequestId, SessionId};

/// Search Job status. Wire format is `SCREAMING_SNAKE_CASE` per the HTTP
/// contract (`PENDING`, `DONE_SUCCESS`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    DoneSuccess,
    DoneClarify,
    DoneStopped,
    DoneFailed,
}

impl JobStatus {
    /// Any `DONE_*` status is terminal: once reached, never changes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::DoneSuccess
                | JobStatus::DoneClarify
                | JobStatus::DoneStopped
                | JobStatus::DoneFailed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub original: String,
    pub language: Option<String>,
}

/// Caller-supplied search filters (spec §6's `Body: {query, ...filters}`).
/// Absent filters are `None`/`false`, which the Ranking stage's zero-forcing
/// invariant and the Post-Filter stage both treat as "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(rename = "openNowOnly", default)]
    pub open_now_only: bool,
    #[serde(rename = "maxPriceLevel", default)]
    pub max_price_level: Option<u8>,
    #[serde(rename = "minRating", default)]
    pub min_rating: Option<f64>,
    #[serde(rename = "cuisineKey", default)]
    pub cuisine_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub code: String,
    pub message: String,
}

/// The unit of work. Mutated only by its Runner and its heartbeat ticker;
/// read by Controllers, SSE Orchestrators, and the Deduplication Decider.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Job {
    pub request_id: RequestId,
    pub owner_session_id: SessionId,
    pub idempotency_key: String,
    #[builder(default = JobStatus::Pending)]
    pub status: JobStatus,
    #[builder(default = 0)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub query: QueryInfo,
    /// Requested reply/assistant locale, distinct from the *search* language
    /// Route Mapping canonicalizes into.
    #[builder(default)]
    pub locale: Option<String>,
    #[builder(default)]
    pub region: Option<String>,
    /// Caller-supplied coordinates, already coarsened for privacy by the
    /// controller before the Job is built.
    #[builder(default)]
    pub user_location: Option<(f64, f64)>,
    #[builder(default)]
    pub filters: SearchFilters,
    #[builder(default)]
    pub result: Option<SearchResponse>,
    #[builder(default)]
    pub error: Option<JobError>,
}

impl Job {
    /// Invariant: `result` and `error` are mutually exclusive, and both are
    /// only meaningful once status reached the matching terminal state.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.result.is_some() && self.error.is_some() {
            violations.push("result and error both set".to_string());
        }
        if self.updated_at < self.created_at {
            violations.push("updated_at before created_at".to_string());
        }
        match self.status {
            JobStatus::DoneSuccess | JobStatus::DoneClarify => {
                if self.error.is_some() {
                    violations.push(format!("{:?} must not carry an error", self.status));
                }
            }
            JobStatus::DoneFailed => {
                if self.result.is_some() {
                    violations.push("DONE_FAILED must not carry a result".to_string());
                }
            }
            _ => {}
        }
        violations
    }
}

/// Open-now tri-state. `Unknown` reflects absence of authoritative hours
/// data — it is not equivalent to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpenNowState {
    Open,
    Closed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessStatus {
    Operational,
    ClosedTemporarily,
    ClosedPermanently,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceResult {
    pub id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub price_level: Option<u8>,
    pub business_status: BusinessStatus,
    pub open_now: OpenNowState,
    /// Canonical form `places/{placeId}/photos/{photoId}`, validated by the
    /// photo proxy before any upstream call.
    pub photo_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistType {
    Ready,
    Clarify,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assist {
    #[serde(rename = "type")]
    pub kind: AssistType,
    pub message: Option<String>,
    pub question: Option<String>,
    #[serde(rename = "suggestedAction")]
    pub suggested_action: Option<String>,
    #[serde(rename = "blocksSearch")]
    pub blocks_search: Option<bool>,
}

impl Assist {
    pub fn ready() -> Self {
        Self {
            kind: AssistType::Ready,
            message: None,
            question: None,
            suggested_action: None,
            blocks_search: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            kind: AssistType::Error,
            message: Some(message),
            question: None,
            suggested_action: None,
            blocks_search: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Result source, surfaced in `meta.source` so callers can tell a cache hit
/// from a live upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    ProviderApi,
    Cache,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMeta {
    #[serde(rename = "tookMs")]
    pub took_ms: u64,
    pub mode: String,
    #[serde(rename = "appliedFilters")]
    pub applied_filters: Vec<String>,
    pub confidence: f64,
    pub source: ResultSource,
    #[serde(rename = "failureReason")]
    pub failure_reason: String,
    pub pagination: Option<Pagination>,
    #[serde(rename = "streetGrouping")]
    pub street_grouping: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub query: QueryInfo,
    pub results: Vec<PlaceResult>,
    pub groups: Option<Vec<String>>,
    pub chips: Vec<String>,
    pub assist: Assist,
    pub meta: SearchMeta,
}
