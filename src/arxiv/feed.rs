//! Atom feed parsing for arXiv API responses.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::types::Paper;

#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Published,
    Abstract,
    Author,
}

pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<Paper>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut papers = Vec::new();
    let mut in_entry = false;
    let mut target: Option<Field> = None;
    let mut id = String::new();
    let mut title = String::new();
    let mut published = String::new();
    let mut abstract_text = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut html_url: Option<String> = None;
    let mut pdf_url: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    id.clear();
                    title.clear();
                    published.clear();
                    abstract_text.clear();
                    authors.clear();
                    html_url = None;
                    pdf_url = None;
                    target = None;
                }
                b"id" if in_entry => target = Some(Field::Id),
                b"title" if in_entry => target = Some(Field::Title),
                b"published" if in_entry => target = Some(Field::Published),
                b"summary" if in_entry => target = Some(Field::Abstract),
                b"name" if in_entry => target = Some(Field::Author),
                b"link" if in_entry => read_link(&e, &mut html_url, &mut pdf_url),
                _ => {}
            },
            // arXiv emits links as self-closing elements.
            Event::Empty(e) if in_entry && e.local_name().as_ref() == b"link" => {
                read_link(&e, &mut html_url, &mut pdf_url);
            }
            Event::Text(t) => {
                if let Some(field) = target.take() {
                    let text = t.unescape()?.into_owned();
                    match field {
                        Field::Id => id = text,
                        Field::Title => title = squash_whitespace(&text),
                        Field::Published => published = text.trim().to_string(),
                        Field::Abstract => abstract_text = squash_whitespace(&text),
                        Field::Author => authors.push(text.trim().to_string()),
                    }
                }
            }
            Event::End(e) if in_entry && e.local_name().as_ref() == b"entry" => {
                in_entry = false;
                papers.push(Paper {
                    id: normalize_id(&id),
                    title: std::mem::take(&mut title),
                    authors: std::mem::take(&mut authors),
                    published: std::mem::take(&mut published),
                    abstract_text: std::mem::take(&mut abstract_text),
                    html_url: html_url.take(),
                    pdf_url: pdf_url.take(),
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(papers)
}

fn read_link(e: &BytesStart<'_>, html_url: &mut Option<String>, pdf_url: &mut Option<String>) {
    let mut rel = None;
    let mut href = None;
    let mut kind = None;
    let mut title = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.local_name().as_ref() {
            b"rel" => rel = Some(value),
            b"href" => href = Some(value),
            b"type" => kind = Some(value),
            b"title" => title = Some(value),
            _ => {}
        }
    }

    let Some(href) = href else { return };
    if rel.as_deref() == Some("alternate") && html_url.is_none() {
        *html_url = Some(href);
    } else if (kind.as_deref().unwrap_or("").contains("pdf")
        || title
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("pdf")))
        && pdf_url.is_none()
    {
        *pdf_url = Some(href);
    }
}

/// Reduce an entry `<id>` like `http://arxiv.org/abs/2501.01234v2` to
/// `2501.01234`.
fn normalize_id(raw: &str) -> String {
    let tail = raw.trim().rsplit('/').next().unwrap_or(raw);
    let tail = tail.strip_prefix("arXiv:").unwrap_or(tail);
    match tail.rfind('v') {
        Some(ix)
            if ix + 1 < tail.len() && tail[ix + 1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            tail[..ix].to_string()
        }
        _ => tail.to_string(),
    }
}

/// arXiv wraps titles and abstracts across lines with leading indentation.
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
