//! Stage 2: picks a provider route and extracts location hints.

use serde::Deserialize;

use super::context::PipelineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRoute {
    TextSearch,
    Nearby,
    Landmark,
}

#[derive(Debug, Clone)]
pub struct IntentOutput {
    pub route: ProviderRoute,
    pub city_hint: Option<String>,
    pub landmark_text: Option<String>,
    pub radius_m: Option<u32>,
    pub reason: String,
    pub route_confidence: f64,
    pub location_confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    route: String,
    city_hint: Option<String>,
    landmark_text: Option<String>,
    radius_m: Option<u32>,
    route_confidence: f64,
    location_confidence: f64,
}

fn prompt_for(query: &str, language: &str) -> String {
    format!(
        "Pick the provider route for this restaurant query: TEXTSEARCH, NEARBY, or LANDMARK. \
         Extract an optional city, landmark text, or radius in meters. \
         Respond as JSON {{\"route\":..,\"city_hint\":..,\"landmark_text\":..,\"radius_m\":..,\"route_confidence\":..,\"location_confidence\":..}}.\n\
         Language: {language}\nQuery: {query}"
    )
}

/// On LM timeout or invalid output, falls back deterministically to
/// `TEXTSEARCH` — never throws into the caller.
pub async fn route_intent(query: &str, language: &str, ctx: &PipelineContext) -> IntentOutput {
    let prompt = prompt_for(query, language);

    match tokio::time::timeout(
        std::time::Duration::from_secs(8),
        ctx.language_model.complete_json_value(&prompt),
    )
    .await
    {
        Ok(Ok(value)) => match serde_json::from_value::<RawIntent>(value) {
            Ok(raw) => IntentOutput {
                route: parse_route(&raw.route),
                city_hint: raw.city_hint,
                landmark_text: raw.landmark_text,
                radius_m: raw.radius_m,
                reason: "lm_routed".to_string(),
                route_confidence: raw.route_confidence,
                location_confidence: raw.location_confidence,
            },
            Err(_) => fallback("fallback_error"),
        },
        Ok(Err(_)) => fallback("fallback_error"),
        Err(_) => fallback("fallback_timeout"),
    }
}

fn parse_route(raw: &str) -> ProviderRoute {
    match raw {
        "NEARBY" => ProviderRoute::Nearby,
        "LANDMARK" => ProviderRoute::Landmark,
        _ => ProviderRoute::TextSearch,
    }
}

fn fallback(reason: &str) -> IntentOutput {
    IntentOutput {
        route: ProviderRoute::TextSearch,
        city_hint: None,
        landmark_text: None,
        radius_m: None,
        reason: reason.to_string(),
        route_confidence: 0.0,
        location_confidence: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MockLanguageModel;
    use std::sync::Arc;

    fn ctx_with(lm: MockLanguageModel) -> PipelineContext {
        PipelineContext::new(
            crate::common::entity_ids::RequestId::new(),
            crate::common::entity_ids::SessionId::new(),
            None,
            Arc::new(lm),
        )
    }

    #[tokio::test]
    async fn nearby_route_is_parsed() {
        let lm = MockLanguageModel::with_responses([
            r#"{"route":"NEARBY","city_hint":null,"landmark_text":null,"radius_m":5000,"route_confidence":0.8,"location_confidence":0.9}"#
                .to_string(),
        ]);
        let ctx = ctx_with(lm);
        let out = route_intent("restaurants near me", "en", &ctx).await;
        assert_eq!(out.route, ProviderRoute::Nearby);
        assert_eq!(out.radius_m, Some(5000));
    }

    #[tokio::test]
    async fn lm_failure_falls_back_to_textsearch_with_error_reason() {
        let lm = MockLanguageModel::default();
        let ctx = ctx_with(lm);
        let out = route_intent("pizza", "en", &ctx).await;
        assert_eq!(out.route, ProviderRoute::TextSearch);
        assert_eq!(out.reason, "fallback_error");
    }

    #[tokio::test]
    async fn invalid_json_falls_back_to_textsearch() {
        let lm = MockLanguageModel::with_responses(["garbage".to_string()]);
        let ctx = ctx_with(lm);
        let out = route_intent("pizza", "en", &ctx).await;
        assert_eq!(out.route, ProviderRoute::TextSearch);
        assert_eq!(out.reason, "fallback_error");
    }
}
