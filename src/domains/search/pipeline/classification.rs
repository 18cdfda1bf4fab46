//! Stage 1: tri-state food/intent/language classifier.

use serde::Deserialize;

use super::context::PipelineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodSignal {
    No,
    Uncertain,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationRoute {
    Continue,
    AskClarify,
    Stop,
}

#[derive(Debug, Clone)]
pub struct ClassificationOutput {
    pub food_signal: FoodSignal,
    pub language: String,
    pub route: ClassificationRoute,
    pub confidence: f64,
    pub reason: &'static str,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    food_signal: String,
    language: String,
    confidence: f64,
}

/// Prompt template is opaque per spec — this placeholder is not tuned.
fn prompt_for(query: &str) -> String {
    format!(
        "Classify whether this query is about finding a restaurant or food. \
         Respond as JSON {{\"food_signal\": \"YES\"|\"NO\"|\"UNCERTAIN\", \"language\": \"<bcp47>\", \"confidence\": <0..1>}}.\n\nQuery: {query}"
    )
}

const LOW_CONFIDENCE_THRESHOLD: f64 = 0.35;
const CLARIFY_THRESHOLD: f64 = 0.6;

pub async fn classify(query: &str, ctx: &PipelineContext) -> ClassificationOutput {
    let prompt = prompt_for(query);

    let parsed = ctx
        .language_model
        .complete_json_value(&prompt)
        .await
        .ok()
        .and_then(|v| serde_json::from_value::<RawClassification>(v).ok());

    let Some(raw) = parsed else {
        return fallback("UNDETERMINED_LANGUAGE");
    };

    let food_signal = match raw.food_signal.as_str() {
        "YES" => FoodSignal::Yes,
        "NO" => FoodSignal::No,
        _ => FoodSignal::Uncertain,
    };

    let route = route_for(food_signal, raw.confidence);

    ClassificationOutput {
        food_signal,
        language: raw.language,
        route,
        confidence: raw.confidence,
        reason: reason_for(route),
    }
}

fn route_for(food_signal: FoodSignal, confidence: f64) -> ClassificationRoute {
    match food_signal {
        FoodSignal::No if confidence >= CLARIFY_THRESHOLD => ClassificationRoute::Stop,
        FoodSignal::No => ClassificationRoute::AskClarify,
        FoodSignal::Uncertain => ClassificationRoute::AskClarify,
        FoodSignal::Yes if confidence < LOW_CONFIDENCE_THRESHOLD => ClassificationRoute::AskClarify,
        FoodSignal::Yes => ClassificationRoute::Continue,
    }
}

fn reason_for(route: ClassificationRoute) -> &'static str {
    match route {
        ClassificationRoute::Continue => "food_intent_confirmed",
        ClassificationRoute::AskClarify => "ambiguous_intent",
        ClassificationRoute::Stop => "LOW_CONFIDENCE",
    }
}

/// Deterministic fallback when the language model times out or returns
/// invalid output — the stage never throws into the caller.
fn fallback(language: &str) -> ClassificationOutput {
    ClassificationOutput {
        food_signal: FoodSignal::Uncertain,
        language: language.to_string(),
        route: ClassificationRoute::AskClarify,
        confidence: 0.0,
        reason: "fallback_error",
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
    async fn clear_food_query_continues() {
        let lm = MockLanguageModel::with_responses([
            r#"{"food_signal":"YES","language":"en","confidence":0.9}"#.to_string(),
        ]);
        let ctx = ctx_with(lm);
        let out = classify("pizza in Tel Aviv", &ctx).await;
        assert_eq!(out.route, ClassificationRoute::Continue);
        assert_eq!(out.food_signal, FoodSignal::Yes);
    }

    #[tokio::test]
    async fn confidently_non_food_query_stops() {
        let lm = MockLanguageModel::with_responses([
            r#"{"food_signal":"NO","language":"en","confidence":0.95}"#.to_string(),
        ]);
        let ctx = ctx_with(lm);
        let out = classify("what time is it", &ctx).await;
        assert_eq!(out.route, ClassificationRoute::Stop);
        assert_eq!(out.reason, "LOW_CONFIDENCE");
    }

    #[tokio::test]
    async fn uncertain_query_asks_to_clarify() {
        let lm = MockLanguageModel::with_responses([
            r#"{"food_signal":"UNCERTAIN","language":"en","confidence":0.4}"#.to_string(),
        ]);
        let ctx = ctx_with(lm);
        let out = classify("something good", &ctx).await;
        assert_eq!(out.route, ClassificationRoute::AskClarify);
    }

    #[tokio::test]
    async fn lm_failure_falls_back_deterministically() {
        let lm = MockLanguageModel::default();
        let ctx = ctx_with(lm);
        let out = classify("anything", &ctx).await;
        assert_eq!(out.route, ClassificationRoute::AskClarify);
        assert_eq!(out.reason, "fallback_error");
        assert_eq!(out.confidence, 0.0);
    }

    #[tokio::test]
    async fn invalid_json_falls_back_deterministically() {
        let lm = MockLanguageModel::with_responses(["not json".to_string()]);
        let ctx = ctx_with(lm);
        let out = classify("anything", &ctx).await;
        assert_eq!(out.route, ClassificationRoute::AskClarify);
    }
}
