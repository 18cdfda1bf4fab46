//! Stage 8: a pure validator plus a separate sanitizer. `checkInvariants`
//! never mutates; `sanitize` returns a corrected copy only when needed.

use crate::domains::search::models::{AssistType, SearchResponse};

pub fn check_invariants(response: &SearchResponse) -> Vec<String> {
    let mut violations = Vec::new();

    let is_clarify_or_stopped =
        matches!(response.assist.kind, AssistType::Clarify | AssistType::Stopped);
    let has_failure = response.meta.failure_reason != "NONE";

    if is_clarify_or_stopped || has_failure {
        if !response.results.is_empty() {
            violations.push("CLARIFY/STOPPED/failed response must have empty results".to_string());
        }
        if response.groups.is_some() {
            violations.push("CLARIFY/STOPPED/failed response must have no groups".to_string());
        }
        if response.meta.pagination.is_some() {
            violations.push("CLARIFY/STOPPED/failed response must have no pagination".to_string());
        }
    }

    violations
}

/// A corrected copy, only when `check_invariants` found something. Logged as
/// a bug by the caller; this function itself never logs or mutates in place.
pub fn sanitize(response: SearchResponse) -> SearchResponse {
    if check_invariants(&response).is_empty() {
        return response;
    }

    let mut response = response;
    let is_clarify_or_stopped =
        matches!(response.assist.kind, AssistType::Clarify | AssistType::Stopped);
    let has_failure = response.meta.failure_reason != "NONE";

    if is_clarify_or_stopped || has_failure {
        response.results.clear();
        response.groups = None;
        response.meta.pagination = None;
    }

    response
}
