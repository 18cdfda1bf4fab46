//! Populates the caller's session id in request extensions, if present.
//! Non-blocking — a missing or malformed `X-Session-Id` is not rejected
//! here; handlers that require a session call `extract_session_id`
//! themselves and surface `MissingSession` (401) at that point.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::domains::auth::session::extract_session_id;

pub async fn populate_session(mut request: Request, next: Next) -> Response {
    if let Ok(session_id) = extract_session_id(request.headers()) {
        request.extensions_mut().insert(session_id);
    }
    next.run(request).await
}
