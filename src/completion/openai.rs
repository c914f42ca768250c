//! OpenAI-compatible chat completions client

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Completion, GenerationFailure, Message};
use crate::config::CompletionConfig;

/// Chat completions request body
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

/// Chat completions response structures (only what we read)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Blocking client for `POST {base_url}/chat/completions`
pub struct OpenAiClient {
    agent: ureq::Agent,
    config: CompletionConfig,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: CompletionConfig, api_key: impl Into<String>) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            config,
            api_key: api_key.into(),
        }
    }

    /// Same settings, different model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, messages: &[Message], temperature: f32) -> Result<String, GenerationFailure> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature,
            max_tokens: self.config.max_tokens,
        };
        serde_json::to_string(&request).map_err(|e| GenerationFailure::Malformed(e.to_string()))
    }

    /// One outbound request, no retry
    pub fn try_generate(&self, messages: &[Message], temperature: f32) -> Result<String, GenerationFailure> {
        if messages.is_empty() {
            return Err(GenerationFailure::EmptyRequest);
        }

        let request_body = self.request_body(messages, temperature)?;

        log::debug!(
            "POST {} model={} messages={} temperature={}",
            self.endpoint(),
            self.config.model,
            messages.len(),
            temperature
        );

        let mut response = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(request_body.as_bytes())
            .map_err(map_ureq_err)?;

        let response_body = response.body_mut().read_to_string().map_err(map_ureq_err)?;

        parse_response(&response_body)
    }
}

impl Completion for OpenAiClient {
    fn generate(&self, messages: &[Message], temperature: f32) -> Option<String> {
        match self.try_generate(messages, temperature) {
            Ok(text) => Some(text),
            Err(e) => {
                log::warn!("Generation failed (model {}): {}", self.model(), e);
                None
            }
        }
    }
}

fn map_ureq_err(e: ureq::Error) -> GenerationFailure {
    match e {
        ureq::Error::StatusCode(code) => GenerationFailure::Status(code),
        other => GenerationFailure::Transport(other.to_string()),
    }
}

/// Extract the trimmed text of the first choice; extra choices are ignored
fn parse_response(body: &str) -> Result<String, GenerationFailure> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationFailure::Malformed(e.to_string()))?;

    let choice = response.choices.into_iter().next().ok_or(GenerationFailure::NoChoices)?;
    let content = choice.message.content.ok_or(GenerationFailure::MissingContent)?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(base_url: &str) -> OpenAiClient {
        let config = CompletionConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            ..CompletionConfig::default()
        };
        OpenAiClient::new(config, "sk-test")
    }

    #[test]
    fn test_parse_response_takes_first_choice_trimmed() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "  Let's use an e-ink display.\n"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;
        assert_eq!(parse_response(body).unwrap(), "Let's use an e-ink display.");
    }

    #[test]
    fn test_parse_response_failures() {
        assert!(matches!(parse_response(r#"{"choices": []}"#), Err(GenerationFailure::NoChoices)));
        assert!(matches!(
            parse_response(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#),
            Err(GenerationFailure::MissingContent)
        ));
        assert!(matches!(
            parse_response(r#"{"error": {"message": "bad key"}}"#),
            Err(GenerationFailure::Malformed(_))
        ));
        assert!(matches!(parse_response("<html>"), Err(GenerationFailure::Malformed(_))));
    }

    #[test]
    fn test_parse_response_blank_content_is_success() {
        let body = r#"{"choices": [{"message": {"content": "   "}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "");
    }

    #[test]
    fn test_request_body_shape() {
        let client = client("https://api.openai.com/v1/");
        let messages = vec![Message::system("You are terse."), Message::user("hello")];
        let body = client.request_body(&messages, 0.7).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["max_tokens"], 200);
        assert!((value["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_with_model() {
        let client = client("http://localhost").with_model("gpt-4o");
        assert_eq!(client.model(), "gpt-4o");
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let client = client("http://127.0.0.1:9");
        assert!(matches!(client.try_generate(&[], 0.5), Err(GenerationFailure::EmptyRequest)));
        assert_eq!(client.generate(&[], 0.5), None);
    }

    #[test]
    fn test_generate_sends_one_authorized_request() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4",
                "max_tokens": 200,
                "temperature": 0.5,
                "messages": [
                    {"role": "system", "content": "You are the Client."},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [
                    {"message": {"role": "assistant", "content": "  Make it glow.  "}},
                    {"message": {"role": "assistant", "content": "second"}}
                ]}"#,
            )
            .expect(1)
            .create();

        let client = client(&server.url());
        let messages = vec![Message::system("You are the Client."), Message::user("hello")];
        let reply = client.generate(&messages, 0.5);

        mock.assert();
        assert_eq!(reply.as_deref(), Some("Make it glow."));
    }

    #[test]
    fn test_server_error_is_not_retried() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error": {"message": "overloaded"}}"#)
            .expect(1)
            .create();

        let client = client(&server.url());
        let messages = [Message::user("hello")];

        assert!(matches!(client.try_generate(&messages, 0.5), Err(GenerationFailure::Status(500))));
        mock.assert();
    }

    #[test]
    fn test_server_error_becomes_none() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .expect(1)
            .create();

        let client = client(&server.url());
        assert_eq!(client.generate(&[Message::user("hello")], 0.5), None);
        mock.assert();
    }

    #[test]
    fn test_unreachable_backend_is_absorbed() {
        let client = client("http://127.0.0.1:9");
        let reply = client.generate(&[Message::user("hello")], 0.5);
        assert_eq!(reply, None);
    }
}
