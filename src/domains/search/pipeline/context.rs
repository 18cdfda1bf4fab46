use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::common::entity_ids::{RequestId, SessionId};
use crate::kernel::LanguageModel;

/// Carried through every stage. Never mutated concurrently; each stage
/// returns a new immutable stage output rather than writing back into the
/// context. The cancellation token and timings bag are the only interior
/// mutability, and both are designed to be safe under concurrent access
/// (the heartbeat ticker and the stage chain run as sibling tasks).
#[derive(Clone)]
pub struct PipelineContext {
    pub request_id: RequestId,
    pub session_id: SessionId,
    pub start_time: Instant,
    /// User-supplied coordinates, if any (already coarsened for privacy).
    pub user_location: Option<(f64, f64)>,
    pub cancellation: CancellationToken,
    pub language_model: Arc<dyn LanguageModel>,
    timings: Arc<Mutex<HashMap<&'static str, Duration>>>,
}

impl PipelineContext {
    pub fn new(
        request_id: RequestId,
        session_id: SessionId,
        user_location: Option<(f64, f64)>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            request_id,
            session_id,
            start_time: Instant::now(),
            user_location,
            cancellation: CancellationToken::new(),
            language_model,
            timings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `shouldAbort` per spec §4.3: consulted before any side effect
    /// (publish, cache write) to prevent work after cancellation.
    pub fn should_abort(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn record_stage_timing(&self, stage: &'static str, elapsed: Duration) {
        self.timings.lock().await.insert(stage, elapsed);
    }

    pub async fn timings_snapshot(&self) -> HashMap<&'static str, Duration> {
        self.timings.lock().await.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
