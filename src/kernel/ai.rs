// Language-model implementation using Anthropic Claude via rig.rs.
//
// This is the infrastructure implementation of LanguageModel. Prompt text
// for each pipeline stage lives in the stage modules; this client only
// knows how to call the vendor API.

use anyhow::Context;
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::anthropic;

use super::traits::LanguageModel;

pub struct ClaudeClient {
    client: anthropic::Client,
}

impl ClaudeClient {
    pub fn new(api_key: String) -> Self {
        let client = anthropic::ClientBuilder::new(&api_key).build();
        Self { client }
    }
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let agent = self
            .client
            .agent(anthropic::CLAUDE_3_5_SONNET)
            .preamble("You are a restaurant-search routing and ranking assistant.")
            .max_tokens(1024)
            .build();

        let response = agent
            .prompt(prompt)
            .await
            .context("failed to call Anthropic API")?;

        Ok(response)
    }
}

/// Deterministic test double. Returns a canned response per call, recording
/// prompts it was given so tests can assert on call count without a network
/// dependency.
#[derive(Default)]
pub struct MockLanguageModel {
    pub responses: std::sync::Mutex<std::collections::VecDeque<String>>,
}

impl MockLanguageModel {
    pub fn with_responses(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        let mut queue = self.responses.lock().unwrap();
        queue
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("MockLanguageModel exhausted its canned responses"))
    }
}
