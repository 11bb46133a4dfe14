//! Fallback strategy that reads the post page directly.
//!
//! Public posts embed the media URL twice: as a `"video_url"` field inside
//! the JSON payload of an inline script, and as the `og:video` meta tag. The
//! script payload is tried first because it points at the original file.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::{Extraction, Extractor, OEmbedClient};
use crate::error::ResolveError;
use crate::http::describe_error;

static VIDEO_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""video_url"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static OG_VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:video"]"#).unwrap());

pub struct ScrapeResolver {
    agent: ureq::Agent,
    oembed: Option<OEmbedClient>,
}

impl ScrapeResolver {
    pub fn new(agent: ureq::Agent, oembed: Option<OEmbedClient>) -> Self {
        Self { agent, oembed }
    }

    fn fetch_page(&self, source_url: &str) -> Result<String, ResolveError> {
        let response = self.agent.get(source_url).call().map_err(|err| {
            ResolveError::ExtractionFailed(format!(
                "fetching post page: {}",
                describe_error(&err)
            ))
        })?;
        response
            .into_string()
            .map_err(|err| ResolveError::ExtractionFailed(format!("reading post page: {err}")))
    }
}

impl Extractor for ScrapeResolver {
    fn name(&self) -> &'static str {
        "scrape"
    }

    fn extract(&self, source_url: &str) -> Result<Extraction, ResolveError> {
        let html = self.fetch_page(source_url)?;
        let media_url = find_video_url(&html).ok_or_else(|| {
            ResolveError::NotFound("video URL not found; post may be private".into())
        })?;

        let metadata = self
            .oembed
            .as_ref()
            .map(|client| client.fetch_or_default(source_url))
            .unwrap_or_default();

        Ok(Extraction {
            media_url,
            title: metadata.title,
            author: metadata.author_name,
        })
    }
}

/// Looks for the media URL in the script payload, then in `og:video`.
pub fn find_video_url(html: &str) -> Option<String> {
    let from_payload = VIDEO_URL_REGEX
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_payload(m.as_str()))
        .find(|url| !url.is_empty());
    if from_payload.is_some() {
        return from_payload;
    }

    debug!("no video_url in script payload, trying og:video");
    let document = Html::parse_document(html);
    document
        .select(&OG_VIDEO_SELECTOR)
        .filter_map(|element| element.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_owned)
}

/// Decodes a JSON string body (`\u0026`, `\/`) and any HTML-escaped
/// ampersands left in it.
fn unescape_payload(raw: &str) -> String {
    let decoded = serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.replace("\\u0026", "&").replace("\\/", "/"));
    decoded.replace("&amp;", "&")
}
