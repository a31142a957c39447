use anyhow::{Context, Result, bail};

use healthlens_core::llm::{ChatMessage, ChatRequest, ChatResponse, CompletionProvider};

use crate::config::API_KEY_ENV;

const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    rt: tokio::runtime::Handle,
}

impl OpenAiClient {
    /// Without a key the client still builds; requests fail until one is set.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("healthlens-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(90))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub async fn complete_async(&self, request: &ChatRequest) -> Result<ChatMessage> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("No API key configured. Set {API_KEY_ENV} or run `healthlens key set <key>`");
        };
        tracing::debug!(model = %request.model, messages = request.messages.len(), "sending completion request");
        let resp = self
            .client
            .post(CHAT_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .context("Failed to reach the OpenAI API")?;

        let status = resp.status();
        let data: ChatResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse completion response (HTTP {status})"))?;

        if !status.is_success() {
            tracing::warn!(%status, "completion request failed");
        }
        data.into_message()
    }
}

impl CompletionProvider for OpenAiClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatMessage> {
        self.rt.block_on(self.complete_async(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthlens_core::llm::DEFAULT_MODEL;

    // --- Integration tests (hit the real OpenAI API) ---

    #[tokio::test]
    #[ignore = "hits OpenAI API"]
    async fn test_complete_returns_message() {
        let key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");
        let client = OpenAiClient::new(Some(key)).unwrap();
        let request = ChatRequest::chat(DEFAULT_MODEL, vec![ChatMessage::user("Reply with OK.")]);
        let reply = client.complete_async(&request).await.unwrap();
        assert_eq!(reply.role, "assistant");
        assert!(!reply.content.is_empty());
    }

    #[tokio::test]
    #[ignore = "hits OpenAI API"]
    async fn test_complete_rejects_bad_key() {
        let client = OpenAiClient::new(Some("sk-invalid".to_string())).unwrap();
        let request = ChatRequest::chat(DEFAULT_MODEL, vec![ChatMessage::user("Hi")]);
        assert!(client.complete_async(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_before_sending() {
        let client = OpenAiClient::new(None).unwrap();
        let request = ChatRequest::chat(DEFAULT_MODEL, vec![ChatMessage::user("Hi")]);
        let err = client.complete_async(&request).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
