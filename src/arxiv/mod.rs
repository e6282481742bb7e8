//! arXiv paper search: query building, Atom feed parsing, and paper metadata.

mod client;
mod feed;
mod types;

pub use client::{ArxivClient, ArxivError, PaperSource};
pub use types::Paper;
