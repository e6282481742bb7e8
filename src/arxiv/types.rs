use serde::Serialize;

/// Metadata for one arXiv paper, extracted from an Atom feed entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paper {
    /// Canonical arXiv id with the version suffix stripped (e.g. `2501.01234`).
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// ISO date from the entry's `<published>` element.
    pub published: String,
    /// The entry's `<summary>` element, i.e. the paper abstract.
    pub abstract_text: String,
    pub html_url: Option<String>,
    pub pdf_url: Option<String>,
}

impl Paper {
    /// Best reference link for display: PDF, then abstract page, then a URL
    /// built from the id.
    pub fn source_url(&self) -> String {
        self.pdf_url
            .clone()
            .or_else(|| self.html_url.clone())
            .unwrap_or_else(|| format!("https://arxiv.org/abs/{}", self.id))
    }
}
