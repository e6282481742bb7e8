mod arxiv;
mod review;
mod summarizer;
mod web;

pub const USER_AGENT: &str = concat!("litrev/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::info;

use arxiv::ArxivClient;
use review::{ReviewEvent, ReviewRequest, run_review};
use summarizer::OpenAiClient;
use web::AppState;

#[derive(Parser)]
#[command(
    name = "litrev",
    version,
    about = "Literature review assistant: search arXiv and stream per-paper summaries"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a literature review and stream it to stdout
    Review {
        /// Research topic
        topic: String,

        /// Number of papers to summarize (1-10)
        #[arg(short = 'n', long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=10))]
        papers: u8,
    },
    /// Start the web UI
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("litrev=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

    match cli.command {
        Command::Review { topic, papers } => run_cli_review(http, &topic, papers as usize).await,
        Command::Serve { host, port } => {
            let state = AppState {
                arxiv: ArxivClient::new(http.clone()),
                summarizer: OpenAiClient::from_env(http).ok(),
            };
            info!("starting litrev web UI");
            web::serve(state, &host, port).await?;
            Ok(())
        }
    }
}

async fn run_cli_review(
    http: Client,
    topic: &str,
    papers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = ReviewRequest::new(topic, papers)?;
    let arxiv = ArxivClient::new(http.clone());
    let summarizer = OpenAiClient::from_env(http)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(async move { run_review(&arxiv, &summarizer, &request, &tx).await });

    while let Some(event) = rx.recv().await {
        render_event(&event);
    }

    run.await??;
    Ok(())
}

fn render_event(event: &ReviewEvent) {
    match event {
        ReviewEvent::Started { topic, requested } => {
            println!("# Literature review: {topic} ({requested} papers)\n");
        }
        ReviewEvent::Found { available: 0 } => {
            println!("No papers found for this topic.");
        }
        ReviewEvent::Found { .. } => {}
        ReviewEvent::Summary { index, paper } => {
            println!("## {}. {}\n", index, paper.title);
            println!("*{}* ({})\n", paper.authors.join(", "), paper.published);
            println!("{}\n", paper.summary);
            println!("<{}>\n", paper.source_url);
        }
        ReviewEvent::Warning { message } => {
            println!("> {message}\n");
        }
        ReviewEvent::Finished {
            delivered,
            requested,
        } => {
            if *delivered > 0 {
                println!("---\n{delivered} of {requested} papers summarized.");
            }
        }
        // The CLI surfaces run errors through run_review's Result, not an event.
        ReviewEvent::Failed { .. } => {}
    }
}
