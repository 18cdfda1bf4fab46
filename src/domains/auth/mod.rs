//! Session-bound authorization (spec §4.5): every Job belongs to exactly
//! one session, and a caller other than that session never learns whether
//! the Job exists.

pub mod authorization;
pub mod session;

pub use authorization::authorize_job_access;
pub use session::{extract_session_id, SESSION_HEADER};
