//! Pure decision function on `(candidate job, now)`. Never touches I/O,
//! never mutates its input. See spec §4.2's decision matrix.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domains::search::models::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupReason {
    NoCandidate,
    CachedResultAvailable,
    StatusClarify,
    StatusStopped,
    StatusPending,
    PreviousJobFailed,
    RunningFresh,
    StaleRunningNoHeartbeat,
    StaleRunningTooOld,
}

impl DedupReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DedupReason::NoCandidate => "NO_CANDIDATE",
            DedupReason::CachedResultAvailable => "CACHED_RESULT_AVAILABLE",
            DedupReason::StatusClarify => "STATUS_CLARIFY",
            DedupReason::StatusStopped => "STATUS_STOPPED",
            DedupReason::StatusPending => "STATUS_PENDING",
            DedupReason::PreviousJobFailed => "PREVIOUS_JOB_FAILED",
            DedupReason::RunningFresh => "RUNNING_FRESH",
            DedupReason::StaleRunningNoHeartbeat => "STALE_RUNNING_NO_HEARTBEAT",
            DedupReason::StaleRunningTooOld => "STALE_RUNNING_TOO_OLD",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupDecision {
    pub reuse: bool,
    pub reason: DedupReason,
    pub job: Option<Job>,
}

/// `decide(candidate, now) == decide(candidate, now)`: referentially
/// transparent, idempotent, never mutates `candidate`.
pub fn decide(
    candidate: Option<&Job>,
    now: DateTime<Utc>,
    heartbeat_window: Duration,
    running_max_age: Duration,
) -> DedupDecision {
    let Some(job) = candidate else {
        return DedupDecision {
            reuse: false,
            reason: DedupReason::NoCandidate,
            job: None,
        };
    };

    match job.status {
        JobStatus::DoneSuccess => DedupDecision {
            reuse: true,
            reason: DedupReason::CachedResultAvailable,
            job: Some(job.clone()),
        },
        JobStatus::DoneClarify => DedupDecision {
            reuse: true,
            reason: DedupReason::StatusClarify,
            job: Some(job.clone()),
        },
        JobStatus::DoneStopped => DedupDecision {
            reuse: true,
            reason: DedupReason::StatusStopped,
            job: Some(job.clone()),
        },
        JobStatus::Pending => DedupDecision {
            reuse: true,
            reason: DedupReason::StatusPending,
            job: Some(job.clone()),
        },
        JobStatus::DoneFailed => DedupDecision {
            reuse: false,
            reason: DedupReason::PreviousJobFailed,
            job: None,
        },
        JobStatus::Running => {
            let since_heartbeat = (now - job.updated_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let age = (now - job.created_at).to_std().unwrap_or(Duration::ZERO);

            if since_heartbeat > heartbeat_window {
                DedupDecision {
                    reuse: false,
                    reason: DedupReason::StaleRunningNoHeartbeat,
                    job: None,
                }
            } else if age > running_max_age {
                DedupDecision {
                    reuse: false,
                    reason: DedupReason::StaleRunningTooOld,
                    job: None,
                }
            } else {
                DedupDecision {
                    reuse: true,
                    reason: DedupReason::RunningFresh,
                    job: Some(job.clone()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity_ids::{RequestId, SessionId};
    use crate::domains::search::models::QueryInfo;
    use chrono::Duration as ChronoDuration;

    fn job_with(status: JobStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Job {
        Job::builder()
            .request_id(RequestId::new())
            .owner_session_id(SessionId::new())
            .idempotency_key("k".into())
            .status(status)
            .created_at(created_at)
            .updated_at(updated_at)
            .query(QueryInfo {
                original: "pizza".into(),
                language: Some("en".into()),
            })
            .build()
    }

    const HB: Duration = Duration::from_secs(45);
    const MAX_AGE: Duration = Duration::from_secs(300);

    #[test]
    fn absent_candidate_is_new_job() {
        let decision = decide(None, Utc::now(), HB, MAX_AGE);
        assert!(!decision.reuse);
        assert_eq!(decision.reason, DedupReason::NoCandidate);
    }

    #[test]
    fn done_success_is_reused() {
        let now = Utc::now();
        let job = job_with(JobStatus::DoneSuccess, now, now);
        let decision = decide(Some(&job), now, HB, MAX_AGE);
        assert!(decision.reuse);
        assert_eq!(decision.reason, DedupReason::CachedResultAvailable);
    }

    #[test]
    fn done_failed_is_new_job() {
        let now = Utc::now();
        let job = job_with(JobStatus::DoneFailed, now, now);
        let decision = decide(Some(&job), now, HB, MAX_AGE);
        assert!(!decision.reuse);
        assert_eq!(decision.reason, DedupReason::PreviousJobFailed);
    }

    #[test]
    fn running_within_heartbeat_window_boundary_is_still_fresh() {
        let now = Utc::now();
        let updated_at = now - ChronoDuration::seconds(45);
        let job = job_with(JobStatus::Running, now, updated_at);
        let decision = decide(Some(&job), now, HB, MAX_AGE);
        assert!(decision.reuse, "exactly at the window boundary must be fresh");
        assert_eq!(decision.reason, DedupReason::RunningFresh);
    }

    #[test]
    fn running_one_ms_past_the_heartbeat_window_is_stale() {
        let now = Utc::now();
        let updated_at = now - ChronoDuration::milliseconds(45_001);
        let job = job_with(JobStatus::Running, now, updated_at);
        let decision = decide(Some(&job), now, HB, MAX_AGE);
        assert!(!decision.reuse);
        assert_eq!(decision.reason, DedupReason::StaleRunningNoHeartbeat);
    }

    #[test]
    fn running_fresh_heartbeat_but_too_old_overall_is_stale() {
        let now = Utc::now();
        let created_at = now - ChronoDuration::seconds(301);
        let updated_at = now - ChronoDuration::seconds(1);
        let job = job_with(JobStatus::Running, created_at, updated_at);
        let decision = decide(Some(&job), now, HB, MAX_AGE);
        assert!(!decision.reuse);
        assert_eq!(decision.reason, DedupReason::StaleRunningTooOld);
    }

    #[test]
    fn decide_is_pure_and_does_not_mutate_input() {
        let now = Utc::now();
        let job = job_with(JobStatus::Pending, now, now);
        let before = job.clone();
        let _ = decide(Some(&job), now, HB, MAX_AGE);
        let _ = decide(Some(&job), now, HB, MAX_AGE);
        assert_eq!(job.request_id, before.request_id);
        assert_eq!(job.status, before.status);
    }
}
