use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::arxiv::{ArxivError, Paper, PaperSource};
use crate::summarizer::SummaryClient;

pub const MIN_PAPERS: usize = 1;
pub const MAX_PAPERS: usize = 10;
pub const DEFAULT_PAPERS: usize = 5;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("paper count must be between 1 and 10, got {0}")]
    CountOutOfRange(usize),
}

/// A validated review query. Constructing one performs all input checks, so
/// a `ReviewRequest` in hand means no validation error can occur later.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    topic: String,
    count: usize,
}

impl ReviewRequest {
    pub fn new(topic: &str, count: usize) -> Result<Self, InputError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(InputError::EmptyTopic);
        }
        if !(MIN_PAPERS..=MAX_PAPERS).contains(&count) {
            return Err(InputError::CountOutOfRange(count));
        }
        Ok(Self {
            topic: topic.to_string(),
            count,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperSummary {
    pub title: String,
    pub authors: Vec<String>,
    pub published: String,
    pub summary: String,
    pub source_url: String,
}

/// One frame of review output, in the order produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReviewEvent {
    Started { topic: String, requested: usize },
    Found { available: usize },
    Summary { index: usize, paper: PaperSummary },
    Warning { message: String },
    Finished { delivered: usize, requested: usize },
    Failed { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("paper search failed: {0}")]
    Search(#[from] ArxivError),
}

/// Run one review: search for up to `count` papers, summarize each in order,
/// and push a `ReviewEvent` per step into `events`.
///
/// Upstream failures after the search degrade to warnings; already-produced
/// summaries are never discarded. A failed search is the only hard error.
/// Returns the number of summaries delivered.
pub async fn run_review(
    source: &impl PaperSource,
    summarizer: &impl SummaryClient,
    request: &ReviewRequest,
    events: &UnboundedSender<ReviewEvent>,
) -> Result<usize, ReviewError> {
    let requested = request.count();
    let _ = events.send(ReviewEvent::Started {
        topic: request.topic().to_string(),
        requested,
    });

    let mut papers = source.search(request.topic(), requested).await?;
    papers.truncate(requested);
    info!(topic = %request.topic(), available = papers.len(), requested, "paper search complete");
    let _ = events.send(ReviewEvent::Found {
        available: papers.len(),
    });

    if papers.is_empty() {
        let _ = events.send(ReviewEvent::Finished {
            delivered: 0,
            requested,
        });
        return Ok(0);
    }

    if papers.len() < requested {
        let _ = events.send(ReviewEvent::Warning {
            message: format!(
                "only {} of {requested} requested papers were found",
                papers.len()
            ),
        });
    }

    let mut delivered = 0;
    for (i, paper) in papers.iter().enumerate() {
        let event = match summarizer.summarize(paper).await {
            Ok(summary) => {
                delivered += 1;
                ReviewEvent::Summary {
                    index: i + 1,
                    paper: to_summary(paper, summary),
                }
            }
            Err(e) => {
                warn!(paper = %paper.id, error = %e, "summarization failed, continuing");
                ReviewEvent::Warning {
                    message: format!("could not summarize \"{}\": {e}", paper.title),
                }
            }
        };
        // A closed channel means the consumer went away; stop doing upstream work.
        if events.send(event).is_err() {
            return Ok(delivered);
        }
    }

    let _ = events.send(ReviewEvent::Finished {
        delivered,
        requested,
    });
    Ok(delivered)
}

fn to_summary(paper: &Paper, summary: String) -> PaperSummary {
    PaperSummary {
        title: paper.title.clone(),
        authors: paper.authors.clone(),
        published: paper.published.clone(),
        summary,
        source_url: paper.source_url(),
    }
}
