use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::csv_import::csv_text;
use crate::models::{DatasetKind, Row};

pub const DEFAULT_MODEL: &str = "gpt-4.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    /// Request for narrative advice on a prepared prompt.
    #[must_use]
    pub fn advice(model: &str, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(crate::advice::ADVICE_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            max_tokens: 1200,
            temperature: 0.3,
        }
    }

    #[must_use]
    pub fn chat(model: &str, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl ChatResponse {
    /// The first choice's message, or the provider's error.
    pub fn into_message(self) -> Result<ChatMessage> {
        if let Some(err) = self.error {
            bail!("{}", err.message);
        }
        match self.choices.into_iter().next().and_then(|c| c.message) {
            Some(message) => Ok(message),
            None => bail!("No response from the completion service"),
        }
    }
}

/// Chat-completion backend.
///
/// The CLI implements this over HTTP; tests use canned replies. Called
/// synchronously.
pub trait CompletionProvider {
    fn complete(&self, request: &ChatRequest) -> Result<ChatMessage>;
}

/// A running conversation about one dataset.
///
/// Every question is sent with the dataset as CSV context. The assistant's
/// reply is kept only when the request succeeds, so a failed turn can simply
/// be retried.
#[derive(Debug, Clone)]
pub struct ChatSession {
    kind: DatasetKind,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    #[must_use]
    pub fn new(kind: DatasetKind) -> Self {
        Self {
            kind,
            messages: vec![ChatMessage::system(format!(
                "You are a helpful assistant for analyzing {kind} data. The user has uploaded the \
                 following CSV data. Answer their questions using this data as context."
            ))],
        }
    }

    #[must_use]
    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Non-system messages, as shown to the user.
    pub fn transcript(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != "system")
    }

    pub fn ask(
        &mut self,
        provider: &dyn CompletionProvider,
        model: &str,
        rows: &[Row],
        question: &str,
    ) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            bail!("Question is empty");
        }
        let context = csv_text(rows)?;
        if context.is_empty() {
            bail!("No {} data available. Import a CSV first.", self.kind);
        }

        let mut messages = self.messages.clone();
        messages.push(ChatMessage::user(question));
        messages.push(ChatMessage::system(format!(
            "Here is the CSV data for context:\n{context}"
        )));

        let reply = provider.complete(&ChatRequest::chat(model, messages.clone()))?;
        tracing::debug!(kind = %self.kind, chars = reply.content.len(), "chat reply received");

        let content = reply.content.clone();
        messages.push(reply);
        self.messages = messages;
        Ok(content)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Provider that replays canned results and records requests.
    pub(crate) struct Canned {
        pub replies: RefCell<Vec<Result<String>>>,
        pub requests: RefCell<Vec<ChatRequest>>,
    }

    impl Canned {
        pub(crate) fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionProvider for Canned {
        fn complete(&self, request: &ChatRequest) -> Result<ChatMessage> {
            self.requests.borrow_mut().push(request.clone());
            let reply = self.replies.borrow_mut().remove(0)?;
            Ok(ChatMessage {
                role: "assistant".to_string(),
                content: reply,
            })
        }
    }

    #[test]
    fn test_response_into_message() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.into_message().unwrap().content, "Hi");
    }

    #[test]
    fn test_response_error_payload() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#)
                .unwrap();
        let err = resp.into_message().unwrap_err();
        assert_eq!(err.to_string(), "Incorrect API key provided");
    }

    #[test]
    fn test_response_without_choices() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(resp.into_message().is_err());
    }

    #[test]
    fn test_advice_request_shape() {
        let req = ChatRequest::advice(DEFAULT_MODEL, "prompt".to_string());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "gpt-4.1");
        assert_eq!(json["max_tokens"], 1200);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "prompt");
    }

    fn rows() -> Vec<Row> {
        vec![Row::new().with("Date", "2024-01-01").with("Steps", "4000")]
    }

    #[test]
    fn test_chat_session_appends_reply() {
        let provider = Canned::new(vec![Ok("You walked 4000 steps.".to_string())]);
        let mut session = ChatSession::new(DatasetKind::Exercise);
        let answer = session
            .ask(&provider, DEFAULT_MODEL, &rows(), "  How far did I walk? ")
            .unwrap();
        assert_eq!(answer, "You walked 4000 steps.");

        let requests = provider.requests.borrow();
        let sent = &requests[0];
        assert_eq!(sent.max_tokens, 512);
        assert_eq!(sent.messages.len(), 3);
        assert!(sent.messages[0].content.contains("exercise data"));
        assert_eq!(sent.messages[1], ChatMessage::user("How far did I walk?"));
        assert!(sent.messages[2].content.ends_with("Date,Steps\n2024-01-01,4000"));

        let shown: Vec<&str> = session.transcript().map(|m| m.content.as_str()).collect();
        assert_eq!(shown, ["How far did I walk?", "You walked 4000 steps."]);
    }

    #[test]
    fn test_chat_session_failure_leaves_history() {
        let provider = Canned::new(vec![Err(anyhow::anyhow!("rate limited"))]);
        let mut session = ChatSession::new(DatasetKind::Nutrition);
        let err = session.ask(&provider, DEFAULT_MODEL, &rows(), "Hi").unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_chat_session_rejects_empty_input() {
        let provider = Canned::new(vec![]);
        let mut session = ChatSession::new(DatasetKind::Measurement);
        assert!(session.ask(&provider, DEFAULT_MODEL, &rows(), "   ").is_err());
        assert!(session.ask(&provider, DEFAULT_MODEL, &[], "Hi").is_err());
        assert!(provider.requests.borrow().is_empty());
    }
}
