//! Session identity extraction. Sessions are caller-supplied opaque ids
//! (spec §6) — there is no login flow here, only a bound identity that
//! scopes which Jobs a caller may see.

use axum::http::HeaderMap;

use crate::common::entity_ids::SessionId;
use crate::common::errors::ApiError;

pub const SESSION_HEADER: &str = "x-session-id";

/// Extracts and parses the caller's session id. Missing or malformed header
/// is always `MissingSession` (401) — never distinguished further, so a
/// probing client learns nothing about which case it hit.
pub fn extract_session_id(headers: &HeaderMap) -> Result<SessionId, ApiError> {
    let raw = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingSession)?;

    SessionId::parse(raw).map_err(|_| ApiError::MissingSession)
}
