use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Abstract language-model capability. The vendor SDK itself is an external
/// collaborator; pipeline stages depend on this trait only, so a
/// deterministic test double can stand in without a network call.
///
/// Used behind `Arc<dyn LanguageModel>` in the pipeline context, so the
/// generic convenience method requires `Self: Sized` to keep the trait
/// object-safe; stage code that only holds a trait object uses
/// [`LanguageModel::complete_json_value`] instead.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Free-form text completion.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Completion expected to be a JSON document, returned as an untyped
    /// value so the method stays object-safe.
    async fn complete_json_value(&self, prompt: &str) -> anyhow::Result<serde_json::Value> {
        let raw = self.complete(prompt).await?;
        serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("language model returned invalid JSON: {e}"))
    }

    /// Typed convenience wrapper over [`LanguageModel::complete_json_value`].
    async fn complete_json<T: DeserializeOwned>(&self, prompt: &str) -> anyhow::Result<T>
    where
        Self: Sized,
    {
        let value = self.complete_json_value(prompt).await?;
        Ok(serde_json::from_value(value)?)
    }
}
