use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, warn};

use super::feed::parse_atom_feed;
use super::types::Paper;

const API_BASE: &str = "https://export.arxiv.org/api/query";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, thiserror::Error)]
pub enum ArxivError {
    #[error("arXiv API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("arXiv returned unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("arXiv feed parse error: {0}")]
    Feed(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction for the paper search backend.
/// Implemented by `ArxivClient` for production; mock implementations used in tests.
pub trait PaperSource {
    async fn search(&self, topic: &str, limit: usize) -> Result<Vec<Paper>, ArxivError>;
}

#[derive(Clone)]
pub struct ArxivClient {
    http: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Tokenized `all:` AND-query over the topic terms.
    fn build_query(topic: &str) -> String {
        let terms: Vec<String> = topic
            .split_whitespace()
            .map(|t| format!("all:{t}"))
            .collect();
        if terms.is_empty() {
            "all:*".to_string()
        } else {
            terms.join(" AND ")
        }
    }
}

impl PaperSource for ArxivClient {
    async fn search(&self, topic: &str, limit: usize) -> Result<Vec<Paper>, ArxivError> {
        let search_query = Self::build_query(topic);

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .query(&[("start", 0usize), ("max_results", limit)])
            .header(ACCEPT, "application/atom+xml, application/xml;q=0.9, text/xml;q=0.8")
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            warn!(status = %status, "arXiv API error");
            return Err(ArxivError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {snippet}"),
            });
        }

        // A success status with an HTML or plain-text body means we are not
        // talking to the Atom API; surface that before handing it to the parser.
        if !(content_type.contains("xml") || content_type.contains("atom")) {
            warn!(content_type = %content_type, "arXiv returned non-XML payload");
            return Err(ArxivError::UnexpectedContentType(content_type));
        }

        let text = response.text().await?;
        let papers = parse_atom_feed(&text).map_err(|e| ArxivError::Feed(e.to_string()))?;
        debug!(topic = %topic, found = papers.len(), limit, "arXiv search complete");
        Ok(papers)
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2501.01234v1</id>
    <published>2025-01-15T12:00:00Z</published>
    <title>Mixture-of-Experts Routing</title>
    <summary>We study routing.</summary>
    <author><name>Doe, J.</name></author>
    <link rel="alternate" type="text/html" href="https://arxiv.org/abs/2501.01234"/>
    <link title="pdf" href="https://arxiv.org/pdf/2501.01234.pdf"/>
  </entry>
</feed>
"#;

    // set_body_string would reset the mime to text/plain; set_body_raw keeps
    // the Atom content type the client checks for.
    fn atom_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_raw(body.as_bytes().to_owned(), "application/atom+xml; charset=UTF-8")
    }

    #[tokio::test]
    async fn search_success_returns_papers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(atom_response(FEED))
            .mount(&server)
            .await;

        let client = ArxivClient::with_base_url(Client::new(), &server.uri());
        let papers = client.search("mixture of experts", 3).await.unwrap();

        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].id, "2501.01234");
        assert_eq!(papers[0].title, "Mixture-of-Experts Routing");
    }

    #[tokio::test]
    async fn search_requests_at_most_limit_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("max_results", "3"))
            .and(query_param("sortBy", "relevance"))
            .respond_with(atom_response(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let client = ArxivClient::with_base_url(Client::new(), &server.uri());
        client.search("attention", 3).await.unwrap();
    }

    #[tokio::test]
    async fn search_error_status_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = ArxivClient::with_base_url(Client::new(), &server.uri());
        match client.search("attention", 3).await {
            Err(ArxivError::Api { code: 503, message }) => {
                assert!(message.contains("overloaded"), "got: {message}");
            }
            other => panic!("expected Api(503), got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_html_body_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>captcha</html>".as_bytes().to_owned(), "text/html"),
            )
            .mount(&server)
            .await;

        let client = ArxivClient::with_base_url(Client::new(), &server.uri());
        match client.search("attention", 3).await {
            Err(ArxivError::UnexpectedContentType(ct)) => {
                assert!(ct.contains("text/html"), "got: {ct}");
            }
            other => panic!("expected UnexpectedContentType, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_empty_feed_returns_empty_vec() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(atom_response(
                r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#,
            ))
            .mount(&server)
            .await;

        let client = ArxivClient::with_base_url(Client::new(), &server.uri());
        let papers = client.search("no such topic", 5).await.unwrap();
        assert!(papers.is_empty());
    }
}
