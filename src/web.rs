//! UI shell: embedded form page, health endpoint, and the SSE review stream.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::arxiv::ArxivClient;
use crate::review::{DEFAULT_PAPERS, ReviewEvent, ReviewRequest, run_review};
use crate::summarizer::OpenAiClient;

#[derive(Clone)]
pub struct AppState {
    pub arxiv: ArxivClient,
    /// `None` when no API key is configured; review requests then get a 503.
    pub summarizer: Option<OpenAiClient>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    topic: String,
    papers: Option<usize>,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid bind address: {0}")]
    BindAddress(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health))
        .route("/api/review", get(handle_review))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Validates the query, then streams one review run as SSE frames. Input
/// errors are rejected here, before any upstream request is made.
async fn handle_review(
    State(state): State<AppState>,
    Query(params): Query<ReviewParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request = ReviewRequest::new(&params.topic, params.papers.unwrap_or(DEFAULT_PAPERS))
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let summarizer = state.summarizer.clone().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "summarizer not configured: set OPENAI_API_KEY",
        )
    })?;

    info!(topic = %request.topic(), papers = request.count(), "review run started");

    let (tx, rx) = mpsc::unbounded_channel();
    let arxiv = state.arxiv.clone();
    tokio::spawn(async move {
        if let Err(e) = run_review(&arxiv, &summarizer, &request, &tx).await {
            error!(error = %e, "review run failed");
            let _ = tx.send(ReviewEvent::Failed {
                message: e.to_string(),
            });
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse_event(&event)), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &ReviewEvent) -> Event {
    // ReviewEvent serialization cannot fail in practice; fall back to an
    // empty object rather than dropping the frame.
    Event::default()
        .json_data(event)
        .unwrap_or_else(|_| Event::default().data("{}"))
}

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<(), ServeError> {
    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|_| ServeError::BindAddress(format!("{host}:{port}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => {
                error!("failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Literature Review Assistant</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 46rem; margin: 2rem auto; padding: 0 1rem; color: #1a1a1a; }
  form { display: flex; gap: .5rem; flex-wrap: wrap; align-items: center; }
  #topic { flex: 1; min-width: 14rem; padding: .4rem; }
  #papers { width: 4rem; padding: .4rem; }
  button { padding: .4rem 1rem; }
  #status { color: #555; }
  .paper { border-top: 1px solid #ddd; padding-top: .5rem; margin-top: 1rem; }
  .paper h3 { margin: 0 0 .25rem; }
  .meta { color: #555; font-size: .9rem; margin: 0 0 .5rem; }
  .warning { color: #a60; }
</style>
</head>
<body>
<h1>Literature Review Assistant</h1>
<form id="form">
  <input id="topic" type="text" placeholder="Research topic" required>
  <label>Papers <input id="papers" type="number" min="1" max="10" value="5"></label>
  <button type="submit">Search</button>
</form>
<p id="status"></p>
<div id="output"></div>
<script>
const form = document.getElementById('form');
const status = document.getElementById('status');
const output = document.getElementById('output');
let source = null;

form.addEventListener('submit', (e) => {
  e.preventDefault();
  if (source) source.close();
  const topic = document.getElementById('topic').value;
  const papers = document.getElementById('papers').value;
  output.innerHTML = '';
  status.textContent = 'Working...';

  source = new EventSource(
    '/api/review?topic=' + encodeURIComponent(topic) + '&papers=' + encodeURIComponent(papers)
  );
  source.onmessage = (msg) => {
    const ev = JSON.parse(msg.data);
    switch (ev.type) {
      case 'found':
        if (ev.available === 0) status.textContent = 'No papers found for this topic.';
        break;
      case 'summary': {
        const div = document.createElement('div');
        div.className = 'paper';
        const h = document.createElement('h3');
        h.textContent = ev.index + '. ' + ev.paper.title;
        const meta = document.createElement('p');
        meta.className = 'meta';
        meta.textContent = ev.paper.authors.join(', ') + ' · ' + ev.paper.published;
        const body = document.createElement('p');
        body.textContent = ev.paper.summary;
        const link = document.createElement('a');
        link.href = ev.paper.source_url;
        link.textContent = ev.paper.source_url;
        link.target = '_blank';
        div.append(h, meta, body, link);
        output.appendChild(div);
        break;
      }
      case 'warning': {
        const p = document.createElement('p');
        p.className = 'warning';
        p.textContent = ev.message;
        output.appendChild(p);
        break;
      }
      case 'finished':
        status.textContent = ev.delivered === 0
          ? 'No results.'
          : 'Done: ' + ev.delivered + ' of ' + ev.requested + ' papers summarized.';
        source.close();
        break;
      case 'failed':
        status.textContent = 'Error: ' + ev.message;
        source.close();
        break;
    }
  };
  source.onerror = () => {
    source.close();
    if (status.textContent === 'Working...') {
      status.textContent = 'Request failed. Check the topic and paper count.';
    }
  };
});
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn state_without_summarizer() -> AppState {
        AppState {
            arxiv: ArxivClient::new(Client::new()),
            summarizer: None,
        }
    }

    async fn review_status(state: AppState, topic: &str, papers: Option<usize>) -> StatusCode {
        let params = ReviewParams {
            topic: topic.to_string(),
            papers,
        };
        match handle_review(State(state), Query(params)).await {
            Ok(_) => panic!("expected rejection"),
            Err((status, _)) => status,
        }
    }

    #[tokio::test]
    async fn review_rejects_empty_topic() {
        let status = review_status(state_without_summarizer(), "   ", Some(3)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn review_rejects_out_of_range_count() {
        let status = review_status(state_without_summarizer(), "attention", Some(11)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = review_status(state_without_summarizer(), "attention", Some(0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn review_without_summarizer_is_unavailable() {
        let status = review_status(state_without_summarizer(), "attention", Some(3)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn index_page_constrains_paper_count() {
        assert!(INDEX_HTML.contains(r#"min="1""#));
        assert!(INDEX_HTML.contains(r#"max="10""#));
        assert!(INDEX_HTML.contains(r#"value="5""#));
    }
}
