//! OpenAI-compatible LlmClient on async-openai.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateChatCompletionRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use prompt::ChatMessage;
use tracing::{debug, info, instrument};

use super::{chat_message_to_openai, mask_token, LlmClient, LlmConfig};

/// How long rate-limited requests are retried before the call fails.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(10);

/// Chat-completion client for any endpoint speaking the OpenAI API.
#[derive(Clone)]
pub struct OpenAILlmClient {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    /// Masked once at construction; only ever logged in this form.
    masked_key: String,
}

impl OpenAILlmClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let masked_key = mask_token(&api_key);
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config).with_backoff(retry_backoff(DEFAULT_RETRY_WINDOW));
        Self {
            client: Arc::new(client),
            model,
            masked_key,
        }
    }

    /// Replaces the retry window; `Duration::ZERO` fails on the first rate limit.
    pub fn with_retry_window(mut self, window: Duration) -> Self {
        let client = (*self.client).clone().with_backoff(retry_backoff(window));
        self.client = Arc::new(client);
        self
    }

    pub fn from_config(config: &dyn LlmConfig) -> Self {
        Self::new(
            config.api_key().to_string(),
            config.base_url().to_string(),
            config.model().to_string(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAILlmClient {
    #[instrument(skip(self, messages), fields(model = %self.model))]
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        info!(
            message_count = messages.len(),
            api_key = %self.masked_key,
            "chat completion request"
        );

        let openai_messages = messages
            .iter()
            .map(chat_message_to_openai)
            .collect::<Result<Vec<_>>>()?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(openai_messages)
            .build()?;

        if let Ok(json) = serde_json::to_string_pretty(&request) {
            debug!(request_json = %json, "chat completion request JSON");
        }

        let response = self.client.chat().create(request).await?;

        if let Some(ref u) = response.usage {
            info!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                "chat completion usage"
            );
        }

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            anyhow::bail!("Model returned an empty reply");
        }
        Ok(content)
    }
}

fn retry_backoff(window: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(4))
        .with_max_elapsed_time(Some(window))
        .build()
}
