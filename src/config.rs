use anyhow::Context;
use std::env;
use std::time::Duration;

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub places_api_key: String,
    pub language_model_api_key: String,
    pub dns_preflight: bool,

    /// Deduplication staleness window for a `RUNNING` job's heartbeat.
    pub heartbeat_window: Duration,
    /// Absolute max age after which a `RUNNING` job is considered stale
    /// regardless of heartbeat.
    pub running_max_age: Duration,

    /// Pipeline hard deadline per job.
    pub pipeline_deadline: Duration,
    /// Heartbeat ticker interval while the pipeline runs.
    pub pipeline_heartbeat_interval: Duration,

    /// Per-upstream-call timeout for the provider gateway.
    pub provider_call_timeout: Duration,
    /// Bound on the cache-wrap race before falling back to a direct fetch.
    pub cache_wrap_timeout: Duration,
    /// Maximum results to accumulate across provider pagination.
    pub provider_max_results: usize,

    /// Default bias radius, in meters, applied when a city hint resolves
    /// without an explicit bias.
    pub default_bias_radius_m: u32,

    /// Search-language fallback for a Job whose request carried no `locale`.
    pub default_search_language: String,

    /// Poll interval used by the SSE assistant orchestrator.
    pub sse_poll_interval: Duration,
    /// Overall timeout for the SSE assistant orchestrator.
    pub sse_timeout: Duration,

    /// Date (RFC 8594 `Sunset`) advertised on the legacy `/api` mount.
    pub legacy_sunset: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid u16")?,
            places_api_key: env::var("PLACES_API_KEY")
                .context("PLACES_API_KEY must be set")?,
            language_model_api_key: env::var("LANGUAGE_MODEL_API_KEY")
                .context("LANGUAGE_MODEL_API_KEY must be set")?,
            dns_preflight: env::var("DNS_PREFLIGHT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),

            heartbeat_window: Duration::from_secs(
                parse_env_u64("JOB_HEARTBEAT_WINDOW_SECS", 45)?,
            ),
            running_max_age: Duration::from_secs(
                parse_env_u64("JOB_RUNNING_MAX_AGE_SECS", 300)?,
            ),

            pipeline_deadline: Duration::from_secs(
                parse_env_u64("PIPELINE_DEADLINE_SECS", 30)?,
            ),
            pipeline_heartbeat_interval: Duration::from_secs(
                parse_env_u64("PIPELINE_HEARTBEAT_INTERVAL_SECS", 15)?,
            ),

            provider_call_timeout: Duration::from_secs(
                parse_env_u64("PROVIDER_CALL_TIMEOUT_SECS", 8)?,
            ),
            cache_wrap_timeout: Duration::from_secs(
                parse_env_u64("CACHE_WRAP_TIMEOUT_SECS", 10)?,
            ),
            provider_max_results: parse_env_u64("PROVIDER_MAX_RESULTS", 20)? as usize,

            default_bias_radius_m: parse_env_u64("DEFAULT_BIAS_RADIUS_M", 20_000)? as u32,

            default_search_language: env::var("DEFAULT_SEARCH_LANGUAGE")
                .unwrap_or_else(|_| "en".to_string()),

            sse_poll_interval: Duration::from_millis(
                parse_env_u64("SSE_POLL_INTERVAL_MS", 150)?,
            ),
            sse_timeout: Duration::from_secs(parse_env_u64("SSE_TIMEOUT_SECS", 30)?),

            legacy_sunset: env::var("LEGACY_API_SUNSET")
                .unwrap_or_else(|_| "Sat, 31 Jan 2026 00:00:00 GMT".to_string()),
        })
    }
}

fn parse_env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match env::var(key) {
        Ok(v) => v.parse().with_context(|| format!("{key} must be a valid integer")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_u64_falls_back_to_default_when_unset() {
        env::remove_var("TOTALLY_UNSET_KEY_XYZ");
        assert_eq!(parse_env_u64("TOTALLY_UNSET_KEY_XYZ", 42).unwrap(), 42);
    }
}
