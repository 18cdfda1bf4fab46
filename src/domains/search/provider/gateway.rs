//! Provider Gateway (spec §4.4): coalesced fetch, two-tier cache, retry with
//! backoff, timeout, pagination, closed-place filtering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::domains::search::models::{BusinessStatus, PlaceResult, ResultSource};
use crate::domains::search::pipeline::route_mapping::ProviderRequestMapping;
use crate::domains::search::provider::cache::fingerprint;
use crate::domains::search::provider::places_client::{PlacesApi, ProviderError, TextSearchPage};
use crate::kernel::{KvStore, SingleFlight};

const BACKOFF_SCHEDULE_MS: [u64; 3] = [0, 500, 1000];
const CACHE_TTL: Duration = Duration::from_secs(3600);

pub struct GatewayResult {
    pub results: Vec<PlaceResult>,
    pub served_from: ResultSource,
}

/// Observability counters, logged via `tracing` fields rather than a
/// metrics exporter (metrics export is out of scope; structured logging of
/// these counts is not).
#[derive(Default)]
pub struct GatewayCounters {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub retries: AtomicU64,
    pub closed_places_dropped: AtomicU64,
}

pub struct ProviderGateway {
    client: Arc<dyn PlacesApi>,
    cache: Arc<dyn KvStore>,
    single_flight: SingleFlight<Vec<PlaceResult>, ProviderError>,
    max_results: usize,
    cache_wrap_timeout: Duration,
    pub counters: GatewayCounters,
}

impl ProviderGateway {
    pub fn new(
        client: Arc<dyn PlacesApi>,
        cache: Arc<dyn KvStore>,
        max_results: usize,
        cache_wrap_timeout: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            single_flight: SingleFlight::new(),
            max_results,
            cache_wrap_timeout,
            counters: GatewayCounters::default(),
        }
    }

    #[instrument(skip(self, mapping), fields(route = ?mapping.route))]
    pub async fn text_search(&self, mapping: &ProviderRequestMapping) -> Result<GatewayResult, ProviderError> {
        let key = fingerprint(mapping);

        if let Ok(Some(bytes)) = tokio::time::timeout(self.cache_wrap_timeout, self.cache.get(&key))
            .await
            .unwrap_or(Ok(None))
        {
            if let Ok(results) = serde_json::from_slice::<Vec<PlaceResult>>(&bytes) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(GatewayResult {
                    results,
                    served_from: ResultSource::Cache,
                });
            }
        }
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);

        let mapping_owned = mapping.clone_for_fetch();
        let client = self.client.clone();
        let max_results = self.max_results;
        let retries = &self.counters.retries;
        let closed_dropped = &self.counters.closed_places_dropped;

        let results = self
            .single_flight
            .run(&key, || {
                fetch_with_retry_and_pagination(client, mapping_owned, max_results, retries, closed_dropped)
            })
            .await?;

        if let Ok(bytes) = serde_json::to_vec(&results) {
            let _ = self.cache.set(&key, bytes, CACHE_TTL).await;
        }

        Ok(GatewayResult {
            results,
            served_from: ResultSource::ProviderApi,
        })
    }
}

async fn fetch_with_retry_and_pagination(
    client: Arc<dyn PlacesApi>,
    mapping: ProviderRequestMapping,
    max_results: usize,
    retries: &AtomicU64,
    closed_dropped: &AtomicU64,
) -> Result<Vec<PlaceResult>, ProviderError> {
    let with_bias = fetch_all_pages(&*client, &mapping, max_results, retries, closed_dropped).await?;

    // Low-result retry: if the first attempt with a bias returns <= 1
    // result, retry once without the bias; adopt only if strictly larger.
    if with_bias.len() <= 1 && mapping.bias.is_some() {
        let mut unbiased = mapping.clone_for_fetch();
        unbiased.bias = None;
        if let Ok(without_bias) =
            fetch_all_pages(&*client, &unbiased, max_results, retries, closed_dropped).await
        {
            if without_bias.len() > with_bias.len() {
                return Ok(without_bias);
            }
        }
    }

    Ok(with_bias)
}

async fn fetch_all_pages(
    client: &dyn PlacesApi,
    mapping: &ProviderRequestMapping,
    max_results: usize,
    retries: &AtomicU64,
    closed_dropped: &AtomicU64,
) -> Result<Vec<PlaceResult>, ProviderError> {
    let mut accumulated = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch_one_page_with_retry(client, mapping, page_token.as_deref(), retries).await?;

        for place in page.results {
            if place.business_status == BusinessStatus::ClosedPermanently {
                closed_dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            accumulated.push(place);
        }

        if accumulated.len() >= max_results {
            accumulated.truncate(max_results);
            break;
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(accumulated)
}

async fn fetch_one_page_with_retry(
    client: &dyn PlacesApi,
    mapping: &ProviderRequestMapping,
    page_token: Option<&str>,
    retries: &AtomicU64,
) -> Result<TextSearchPage, ProviderError> {
    let mut last_err = None;

    for (attempt, delay_ms) in BACKOFF_SCHEDULE_MS.iter().enumerate() {
        if *delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }
        if attempt > 0 {
            retries.fetch_add(1, Ordering::Relaxed);
        }

        match client.text_search(mapping, page_token).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() => {
                last_err = Some(e);
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.expect("loop always runs at least once"))
}

impl ProviderRequestMapping {
    fn clone_for_fetch(&self) -> Self {
        self.clone()
    }
}
