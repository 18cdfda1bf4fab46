use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::common::entity_ids::RequestId;
use crate::domains::search::models::{Job, JobStatus, SearchResponse};

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job {0} already exists")]
    AlreadyExists(RequestId),
    #[error("job {0} not found")]
    NotFound(RequestId),
}

/// Operations per the Job Store contract. Persistence is an external
/// collaborator (spec §1); this trait is the seam, with an in-memory
/// reference implementation below. Guarantees: every mutation refreshes
/// `updated_at`; a transition to any `DONE_*` is final; the Runner is the
/// sole writer for a given job after creation.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> Result<Job, JobStoreError>;
    async fn find_by_idempotency_key(&self, key: &str) -> Option<Job>;
    async fn get(&self, request_id: RequestId) -> Option<Job>;
    async fn set_status(
        &self,
        request_id: RequestId,
        status: JobStatus,
        progress: u8,
    ) -> Result<(), JobStoreError>;
    async fn update_heartbeat(&self, request_id: RequestId) -> Result<(), JobStoreError>;
    async fn set_result(
        &self,
        request_id: RequestId,
        result: SearchResponse,
    ) -> Result<(), JobStoreError>;
    async fn set_error(
        &self,
        request_id: RequestId,
        code: String,
        message: String,
    ) -> Result<(), JobStoreError>;
    async fn delete(&self, request_id: RequestId);
}

/// In-memory reference implementation. Stands in for a durable store
/// (the persistence backing is abstract per spec §1). Indexed twice: by
/// `requestId` (primary) and by `idempotencyKey` (secondary, for dedup
/// lookup) — both updated together so a create is visible on either path.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<RequestId, Job>,
    by_idempotency_key: DashMap<String, RequestId>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, JobStoreError> {
        if self.jobs.contains_key(&job.request_id) {
            return Err(JobStoreError::AlreadyExists(job.request_id));
        }
        self.by_idempotency_key
            .insert(job.idempotency_key.clone(), job.request_id);
        self.jobs.insert(job.request_id, job.clone());
        Ok(job)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Option<Job> {
        let request_id = *self.by_idempotency_key.get(key)?;
        self.jobs.get(&request_id).map(|j| j.clone())
    }

    async fn get(&self, request_id: RequestId) -> Option<Job> {
        self.jobs.get(&request_id).map(|j| j.clone())
    }

    async fn set_status(
        &self,
        request_id: RequestId,
        status: JobStatus,
        progress: u8,
    ) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .get_mut(&request_id)
            .ok_or(JobStoreError::NotFound(request_id))?;
        if job.status.is_terminal() {
            // a DONE_* transition is final; silently ignore further writes
            // rather than regress a monotone status.
            return Ok(());
        }
        job.status = status;
        job.progress = progress;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_heartbeat(&self, request_id: RequestId) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .get_mut(&request_id)
            .ok_or(JobStoreError::NotFound(request_id))?;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_result(
        &self,
        request_id: RequestId,
        result: SearchResponse,
    ) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .get_mut(&request_id)
            .ok_or(JobStoreError::NotFound(request_id))?;
        job.result = Some(result);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn set_error(
        &self,
        request_id: RequestId,
        code: String,
        message: String,
    ) -> Result<(), JobStoreError> {
        let mut job = self
            .jobs
            .get_mut(&request_id)
            .ok_or(JobStoreError::NotFound(request_id))?;
        job.error = Some(crate::domains::search::models::JobError { code, message });
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, request_id: RequestId) {
        if let Some((_, job)) = self.jobs.remove(&request_id) {
            self.by_idempotency_key.remove(&job.idempotency_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity_ids::SessionId;
    use crate::domains::search::models::QueryInfo;

    fn new_job(idempotency_key: &str) -> Job {
        let now = Utc::now();
        Job::builder()
            .request_id(RequestId::new())
            .owner_session_id(SessionId::new())
            .idempotency_key(idempotency_key.to_string())
            .created_at(now)
            .updated_at(now)
            .query(QueryInfo {
                original: "pizza".into(),
                language: Some("en".into()),
            })
            .build()
    }

    #[tokio::test]
    async fn create_then_find_by_idempotency_key() {
        let store = InMemoryJobStore::new();
        let job = new_job("key-1");
        let request_id = job.request_id;
        store.create(job).await.unwrap();

        let found = store.find_by_idempotency_key("key-1").await.unwrap();
        assert_eq!(found.request_id, request_id);
    }

    #[tokio::test]
    async fn create_twice_with_same_request_id_fails() {
        let store = InMemoryJobStore::new();
        let job = new_job("key-1");
        let dup = job.clone();
        store.create(job).await.unwrap();
        let err = store.create(dup).await.unwrap_err();
        assert!(matches!(err, JobStoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn set_status_refreshes_updated_at() {
        let store = InMemoryJobStore::new();
        let job = new_job("key-1");
        let request_id = job.request_id;
        let created_at = job.created_at;
        store.create(job).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .set_status(request_id, JobStatus::Running, 10)
            .await
            .unwrap();

        let job = store.get(request_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.updated_at > created_at);
    }

    #[tokio::test]
    async fn terminal_status_is_never_regressed() {
        let store = InMemoryJobStore::new();
        let job = new_job("key-1");
        let request_id = job.request_id;
        store.create(job).await.unwrap();

        store
            .set_status(request_id, JobStatus::DoneSuccess, 100)
            .await
            .unwrap();
        store
            .set_status(request_id, JobStatus::Running, 50)
            .await
            .unwrap();

        let job = store.get(request_id).await.unwrap();
        assert_eq!(job.status, JobStatus::DoneSuccess);
    }

    #[tokio::test]
    async fn delete_removes_both_indices() {
        let store = InMemoryJobStore::new();
        let job = new_job("key-1");
        let request_id = job.request_id;
        store.create(job).await.unwrap();

        store.delete(request_id).await;

        assert!(store.get(request_id).await.is_none());
        assert!(store.find_by_idempotency_key("key-1").await.is_none());
    }
}
