use std::env;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ChatMessage, ChatRequest, ChatResponse};
use crate::arxiv::Paper;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const SUMMARY_PROMPT: &str = "You are a research expert. Given the metadata of one academic paper \
(title, authors, publication date, abstract), write a short Markdown summary covering the problem \
the paper addresses and its main contribution. Keep it to 3-5 sentences and do not invent details \
that are not in the abstract.";

#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("OPENAI_API_KEY not set")]
    ApiKeyNotSet,

    #[error("model API rate limit exceeded")]
    RateLimited,

    #[error("model API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("model returned an empty summary")]
    EmptyResponse,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction for the summarization backend.
/// Implemented by `OpenAiClient` for production; mock implementations used in tests.
pub trait SummaryClient {
    async fn summarize(&self, paper: &Paper) -> Result<String, SummarizerError>;
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn from_env(http: Client) -> Result<Self, SummarizerError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| SummarizerError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(SummarizerError::ApiKeyNotSet);
        }
        let model = env::var("OPENAI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = env::var("OPENAI_BASE_URL")
            .ok()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model,
            base_url,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn user_prompt(paper: &Paper) -> String {
        format!(
            "Title: {}\nAuthors: {}\nPublished: {}\nLink: {}\n\nAbstract:\n{}",
            paper.title,
            paper.authors.join(", "),
            paper.published,
            paper.source_url(),
            paper.abstract_text,
        )
    }
}

impl SummaryClient for OpenAiClient {
    async fn summarize(&self, paper: &Paper) -> Result<String, SummarizerError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SUMMARY_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_prompt(paper),
                },
            ],
            temperature: 0.3,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("model API rate limited");
            return Err(SummarizerError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ChatResponse>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| text.chars().take(200).collect());
            warn!(status = %status, "model API error");
            return Err(SummarizerError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let summary = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(SummarizerError::EmptyResponse)?;

        debug!(model = %self.model, paper = %paper.id, "summary complete");
        Ok(summary)
    }
}

#[cfg(test)]
fn sample_paper() -> Paper {
    Paper {
        id: "2501.01234".into(),
        title: "Attention Revisited".into(),
        authors: vec!["Doe, J.".into(), "Smith, A.".into()],
        published: "2025-01-15T12:00:00Z".into(),
        abstract_text: "We revisit attention.".into(),
        html_url: Some("https://arxiv.org/abs/2501.01234".into()),
        pdf_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_carries_paper_metadata() {
        let prompt = OpenAiClient::user_prompt(&sample_paper());
        assert!(prompt.contains("Title: Attention Revisited"));
        assert!(prompt.contains("Authors: Doe, J., Smith, A."));
        assert!(prompt.contains("Published: 2025-01-15T12:00:00Z"));
        assert!(prompt.contains("We revisit attention."));
    }
}

#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn summarize_success_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "  This paper revisits attention.  "
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let summary = client.summarize(&sample_paper()).await.unwrap();
        assert_eq!(summary, "This paper revisits attention.");
    }

    #[tokio::test]
    async fn summarize_429_returns_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let result = client.summarize(&sample_paper()).await;
        assert!(matches!(result, Err(SummarizerError::RateLimited)));
    }

    #[tokio::test]
    async fn summarize_error_body_message_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "message": "context length exceeded", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        match client.summarize(&sample_paper()).await {
            Err(SummarizerError::Api { code: 400, message }) => {
                assert_eq!(message, "context length exceeded");
            }
            other => panic!("expected Api(400), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn summarize_unstructured_error_body_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        match client.summarize(&sample_paper()).await {
            Err(SummarizerError::Api { code: 502, message }) => {
                assert!(message.contains("bad gateway"), "got: {message}");
            }
            other => panic!("expected Api(502), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn summarize_blank_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "   " } }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url(Client::new(), &server.uri());
        let result = client.summarize(&sample_paper()).await;
        assert!(matches!(result, Err(SummarizerError::EmptyResponse)));
    }
}
