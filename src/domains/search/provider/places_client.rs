use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domains::search::models::{BusinessStatus, OpenNowState, PlaceResult};
use crate::domains::search::pipeline::route_mapping::ProviderRequestMapping;

#[derive(Debug, thiserror::Error, Clone)]
pub enum ProviderError {
    #[error("upstream call timed out")]
    Timeout,
    #[error("upstream returned HTTP {status}")]
    HttpError { status: u16 },
    #[error("network error calling upstream: {0}")]
    NetworkError(String),
}

pub struct TextSearchPage {
    pub results: Vec<PlaceResult>,
    pub next_page_token: Option<String>,
}

/// Abstract upstream Places-style search API. A trait so the Provider
/// Gateway's retry/pagination/coalescing logic can be tested without a
/// network dependency.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn text_search(
        &self,
        mapping: &ProviderRequestMapping,
        page_token: Option<&str>,
    ) -> Result<TextSearchPage, ProviderError>;
}

#[derive(Debug, Serialize)]
struct UpstreamRequestBody<'a> {
    text_query: &'a str,
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    region_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_bias: Option<UpstreamBias>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpstreamBias {
    latitude: f64,
    longitude: f64,
    radius_m: u32,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponseBody {
    places: Vec<UpstreamPlace>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamPlace {
    id: String,
    display_name: String,
    formatted_address: String,
    latitude: f64,
    longitude: f64,
    rating: Option<f64>,
    user_rating_count: Option<u32>,
    price_level: Option<u8>,
    business_status: String,
    #[serde(default)]
    open_now: Option<bool>,
    #[serde(default)]
    photo_reference: Option<String>,
}

impl From<UpstreamPlace> for PlaceResult {
    fn from(p: UpstreamPlace) -> Self {
        PlaceResult {
            id: p.id,
            name: p.display_name,
            address: p.formatted_address,
            latitude: p.latitude,
            longitude: p.longitude,
            rating: p.rating,
            review_count: p.user_rating_count,
            price_level: p.price_level,
            business_status: match p.business_status.as_str() {
                "CLOSED_PERMANENTLY" => BusinessStatus::ClosedPermanently,
                "CLOSED_TEMPORARILY" => BusinessStatus::ClosedTemporarily,
                _ => BusinessStatus::Operational,
            },
            open_now: match p.open_now {
                Some(true) => OpenNowState::Open,
                Some(false) => OpenNowState::Closed,
                None => OpenNowState::Unknown,
            },
            photo_reference: p.photo_reference,
        }
    }
}

pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(api_key: String, call_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://places.googleapis.com/v1/places:searchText".to_string(),
        })
    }
}

#[async_trait]
impl PlacesApi for PlacesClient {
    async fn text_search(
        &self,
        mapping: &ProviderRequestMapping,
        page_token: Option<&str>,
    ) -> Result<TextSearchPage, ProviderError> {
        let body = UpstreamRequestBody {
            text_query: &mapping.canonical_query,
            language_code: &mapping.language_code,
            region_code: mapping.region_code.as_deref(),
            location_bias: mapping.bias.map(|b| UpstreamBias {
                latitude: b.latitude,
                longitude: b.longitude,
                radius_m: b.radius_m,
            }),
            page_token,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpError {
                status: status.as_u16(),
            });
        }

        let parsed: UpstreamResponseBody = response
            .json()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        Ok(TextSearchPage {
            results: parsed.places.into_iter().map(PlaceResult::from).collect(),
            next_page_token: parsed.next_page_token,
        })
    }
}

impl ProviderError {
    /// Retry policy per spec §4.4: retry only on HTTP 429 or 5xx; network
    /// errors and other 4xx are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::HttpError { status } => *status == 429 || (500..600).contains(status),
            ProviderError::Timeout | ProviderError::NetworkError(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_retryable() {
        assert!(ProviderError::HttpError { status: 429 }.is_retryable());
    }

    #[test]
    fn http_5xx_is_retryable() {
        assert!(ProviderError::HttpError { status: 503 }.is_retryable());
    }

    #[test]
    fn http_4xx_other_than_429_is_terminal() {
        assert!(!ProviderError::HttpError { status: 400 }.is_retryable());
    }

    #[test]
    fn network_error_is_terminal() {
        assert!(!ProviderError::NetworkError("boom".into()).is_retryable());
    }
}
