//! Job ownership authorization. Non-disclosure by design: a caller who
//! doesn't own a Job sees the same 404 a caller asking about a Job that
//! never existed would see (spec §4.5) — never a 403, which would leak
//! that the id is valid.

use tracing::warn;

use crate::common::entity_ids::SessionId;
use crate::common::errors::ApiError;
use crate::common::hashing::hash_identity;
use crate::domains::search::models::Job;

/// Returns the job if `caller` owns it; `NotFound` otherwise. Every
/// mismatch is logged with hashed identities only — raw session ids never
/// reach the log stream.
pub fn authorize_job_access(job: Job, caller: SessionId) -> Result<Job, ApiError> {
    if job.owner_session_id != caller {
        warn!(
            request_id = %job.request_id,
            caller_hash = %hash_identity(&caller.to_string()),
            owner_hash = %hash_identity(&job.owner_session_id.to_string()),
            "session does not own this job"
        );
        return Err(ApiError::NotFound);
    }
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity_ids::RequestId;
    use crate::domains::search::models::QueryInfo;
    use chrono::Utc;

    fn job_owned_by(owner: SessionId) -> Job {
        let now = Utc::now();
        Job::builder()
            .request_id(RequestId::new())
            .owner_session_id(owner)
            .idempotency_key("k".into())
            .created_at(now)
            .updated_at(now)
            .query(QueryInfo {
                original: "pizza".into(),
                language: Some("en".into()),
            })
            .build()
    }

    #[test]
    fn owner_is_authorized() {
        let owner = SessionId::new();
        let job = job_owned_by(owner);
        assert!(authorize_job_access(job, owner).is_ok());
    }

    #[test]
    fn non_owner_gets_not_found_not_forbidden() {
        let owner = SessionId::new();
        let stranger = SessionId::new();
        let job = job_owned_by(owner);
        let err = authorize_job_access(job, stranger).unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
