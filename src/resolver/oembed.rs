//! oEmbed lookups: title and author only, never the media itself.

use serde::Deserialize;
use tracing::debug;

use super::{Extraction, Extractor};
use crate::error::ResolveError;
use crate::http::describe_error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OEmbedMetadata {
    pub title: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Clone)]
pub struct OEmbedClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl OEmbedClient {
    pub fn new(agent: ureq::Agent, endpoint: impl Into<String>) -> Self {
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }

    /// `GET <endpoint>?url=<source_url>`.
    pub fn fetch(&self, source_url: &str) -> Result<OEmbedMetadata, ResolveError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("url", source_url)
            .call()
            .map_err(|err| {
                ResolveError::ExtractionFailed(format!(
                    "oEmbed lookup failed: {}",
                    describe_error(&err)
                ))
            })?;

        response.into_json::<OEmbedMetadata>().map_err(|err| {
            ResolveError::ExtractionFailed(format!("unreadable oEmbed response: {err}"))
        })
    }

    /// Like [`fetch`](Self::fetch) but never fails; used to decorate a result
    /// that already has its media URL.
    pub fn fetch_or_default(&self, source_url: &str) -> OEmbedMetadata {
        self.fetch(source_url).unwrap_or_else(|err| {
            debug!(%source_url, error = %err, "keeping default metadata");
            OEmbedMetadata::default()
        })
    }
}

/// Metadata-only strategy for deployments with neither yt-dlp nor a scrapeable
/// page. There is no direct media URL, so the post link itself is returned as
/// the URL the client should open.
pub struct OEmbedResolver {
    client: OEmbedClient,
}

impl OEmbedResolver {
    pub fn new(client: OEmbedClient) -> Self {
        Self { client }
    }
}

impl Extractor for OEmbedResolver {
    fn name(&self) -> &'static str {
        "oembed"
    }

    fn extract(&self, source_url: &str) -> Result<Extraction, ResolveError> {
        let metadata = self.client.fetch(source_url)?;
        Ok(Extraction {
            media_url: source_url.to_owned(),
            title: metadata.title,
            author: metadata.author_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_agent;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn spawn_oembed() -> String {
        let app = Router::new()
            .route(
                "/oembed",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "title": format!(
                            "post at {}",
                            params.get("url").cloned().unwrap_or_default()
                        ),
                        "author_name": "alice",
                        "thumbnail_url": "https://cdn/t.jpg",
                    }))
                }),
            )
            .route(
                "/broken",
                get(|| async { (StatusCode::NOT_FOUND, Json(Value::Null)) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(endpoint: String) -> OEmbedClient {
        OEmbedClient::new(build_agent("test", Duration::from_secs(5)), endpoint)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn metadata_only_resolution_links_back_to_the_post() {
        let base = spawn_oembed().await;
        let extraction = tokio::task::spawn_blocking(move || {
            OEmbedResolver::new(client(format!("{base}/oembed")))
                .extract("https://instagram.com/p/ABC123?x=1&y=2")
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(extraction.media_url, "https://instagram.com/p/ABC123?x=1&y=2");
        assert_eq!(
            extraction.title.as_deref(),
            Some("post at https://instagram.com/p/ABC123?x=1&y=2")
        );
        assert_eq!(extraction.author.as_deref(), Some("alice"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_lookups_default_when_decorating() {
        let base = spawn_oembed().await;
        let (strict, lenient) = tokio::task::spawn_blocking(move || {
            let client = client(format!("{base}/broken"));
            (
                client.fetch("https://instagram.com/p/x"),
                client.fetch_or_default("https://instagram.com/p/x"),
            )
        })
        .await
        .unwrap();

        assert!(matches!(strict, Err(ResolveError::ExtractionFailed(_))));
        assert_eq!(lenient, OEmbedMetadata::default());
    }
}
