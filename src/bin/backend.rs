#![forbid(unsafe_code)]

//! HTTP front end: resolves Instagram posts, relays their videos and exposes
//! the usage counters.
//!
//! Every handler is a thin shell around the blocking core in the library. The
//! work runs on tokio's blocking pool so one slow upstream never stalls
//! unrelated requests.

use std::{
    io::Write,
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use reelgrab::{
    cache::{MemoryCache, ResolutionCache},
    config::{
        DEFAULT_CONFIG_PATH, ResolverKind, RuntimeConfig, StoreKind, load_runtime_config_from,
    },
    error::ResolveError,
    http::build_agent,
    pipeline::Pipeline,
    relay::{
        CHUNK_SIZE, CONTENT_TYPE, Disposition, RelayStream, StreamRelay, generated_filename,
    },
    resolver::{
        Extractor, OEmbedClient, OEmbedResolver, ScrapeResolver, YtDlpResolver, program_available,
    },
    sqlite::SqliteStore,
    stats::{MemoryStats, UsageSnapshot, UsageStore},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{io::DuplexStream, signal, task};
use tokio_util::io::{ReaderStream, SyncIoBridge};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resolve and relay Instagram videos.")]
struct Cli {
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the env file"
    )]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override the listen address")]
    host: Option<IpAddr>,
    #[arg(long = "port", value_name = "PORT", help = "Override the listen port")]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    relay: Arc<StreamRelay>,
    admin_password: Option<Arc<str>>,
    disposition: Disposition,
    trust_proxy: bool,
}

/// JSON error for the API routes: `{"success": false, "message": ...}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Plain-text error for the relay route; browsers show it as-is.
#[derive(Debug)]
struct RelayError {
    status: StatusCode,
    message: String,
}

impl From<ResolveError> for RelayError {
    fn from(err: ResolveError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_runtime_config_from(&cli.config)?;
    let host = match cli.host {
        Some(host) => host,
        None => config
            .host
            .parse::<IpAddr>()
            .with_context(|| format!("parsing HOST {:?}", config.host))?,
    };
    let port = cli.port.unwrap_or(config.port);

    let state = build_state(&config)?;
    let app = router(state);

    let addr = SocketAddr::new(host, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", err);
    }
}

fn build_state(config: &RuntimeConfig) -> Result<AppState> {
    let agent = build_agent(&config.user_agent, config.upstream_timeout);
    let oembed = OEmbedClient::new(agent.clone(), config.oembed_endpoint.clone());

    let ytdlp = || -> Arc<dyn Extractor> {
        Arc::new(YtDlpResolver::new(
            config.ytdlp_path.clone(),
            config.user_agent.clone(),
            config.upstream_timeout,
        ))
    };
    let scrape = || -> Arc<dyn Extractor> {
        let enrich = config.oembed_enrich.then(|| oembed.clone());
        Arc::new(ScrapeResolver::new(agent.clone(), enrich))
    };
    let extractor: Arc<dyn Extractor> = match config.resolver {
        ResolverKind::YtDlp => ytdlp(),
        ResolverKind::Scrape => scrape(),
        ResolverKind::OEmbed => Arc::new(OEmbedResolver::new(oembed.clone())),
        ResolverKind::Auto => {
            if program_available(&config.ytdlp_path) {
                ytdlp()
            } else {
                warn!(
                    "{} not available, falling back to page scraping",
                    config.ytdlp_path.display()
                );
                scrape()
            }
        }
    };

    let (cache, stats): (Arc<dyn ResolutionCache>, Arc<dyn UsageStore>) = match config.store {
        StoreKind::Memory => (Arc::new(MemoryCache::new()), Arc::new(MemoryStats::new())),
        StoreKind::Sqlite => {
            let store = Arc::new(
                SqliteStore::open(&config.db_path).context("initializing usage database")?,
            );
            let cache: Arc<dyn ResolutionCache> = store.clone();
            let stats: Arc<dyn UsageStore> = store;
            (cache, stats)
        }
    };

    let relay = Arc::new(StreamRelay::new(agent));
    let mut pipeline =
        Pipeline::new(extractor, cache, stats).with_retry_delay(config.retry_delay);
    if config.revalidate_cache {
        pipeline = pipeline.with_probe(relay.clone());
    }
    info!(
        extractor = pipeline.extractor_name(),
        store = ?config.store,
        "pipeline ready"
    );

    if config.admin_password.is_none() {
        warn!("ADMIN_PASSWORD not set; /admin/reset will refuse every request");
    }

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        relay,
        admin_password: config.admin_password.as_deref().map(Arc::from),
        disposition: config.disposition,
        trust_proxy: config.trust_proxy,
    })
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/fetch", post(fetch_video))
        .route("/download", post(fetch_video))
        .route("/api/download", get(download_video))
        .route("/proxy", get(download_video))
        .route("/stats", get(get_stats))
        .route("/admin/reset", post(admin_reset))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct FetchRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct FetchResponse {
    success: bool,
    #[serde(rename = "videoUrl")]
    video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_name: Option<String>,
    cached: bool,
}

async fn fetch_video(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<FetchRequest>, JsonRejection>,
) -> ApiResult<Json<FetchResponse>> {
    // An unreadable body is treated like a missing URL.
    let url = body.ok().and_then(|Json(request)| request.url).unwrap_or_default();
    let client_id = client_id(&headers, peer, state.trust_proxy);

    let pipeline = state.pipeline.clone();
    let outcome = task::spawn_blocking({
        let url = url.clone();
        move || pipeline.resolve(&url, &client_id)
    })
    .await
    .map_err(|err| ApiError::internal(format!("task join error: {err}")))?;

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            warn!(source_url = %url, "resolution failed: {err}");
            return Err(err.into());
        }
    };
    info!(source_url = %url, cached = result.cached, "resolved");

    Ok(Json(FetchResponse {
        success: true,
        video_url: result.media_url,
        title: result.title,
        author_name: result.author,
        cached: result.cached,
    }))
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    url: Option<String>,
}

async fn download_video(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, RelayError> {
    let media_url = params.url.unwrap_or_default();
    let relay = state.relay.clone();
    let stream = task::spawn_blocking({
        let media_url = media_url.clone();
        move || relay.open(&media_url)
    })
    .await
    .map_err(|err| RelayError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("task join error: {err}"),
    })?
    .inspect_err(|err| warn!(%media_url, "relay failed: {err}"))?;

    let content_length = stream.content_length();
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(
            header::CONTENT_DISPOSITION,
            state.disposition.header_value(&generated_filename()),
        );
    if let Some(length) = content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response.body(relay_body(stream)).map_err(|err| RelayError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: err.to_string(),
    })
}

/// Pumps the blocking chunk iterator into an in-memory pipe whose read half
/// becomes the response body. Only a few chunks are buffered at a time; a
/// client that goes away closes the pipe and stops the pump.
fn relay_body(stream: RelayStream) -> Body {
    let (reader, writer) = tokio::io::duplex(CHUNK_SIZE * 4);
    task::spawn_blocking(move || pump(stream, writer));
    Body::from_stream(ReaderStream::with_capacity(reader, CHUNK_SIZE))
}

fn pump(stream: RelayStream, writer: DuplexStream) {
    let mut sink = SyncIoBridge::new(writer);
    for chunk in stream {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!("upstream stream ended early: {err}");
                return;
            }
        };
        if let Err(err) = sink.write_all(&chunk) {
            debug!("client stopped reading: {err}");
            return;
        }
    }
    if let Err(err) = sink.flush() {
        debug!("flushing relay body: {err}");
    }
}

async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<UsageSnapshot>> {
    let pipeline = state.pipeline.clone();
    let snapshot = task::spawn_blocking(move || pipeline.stats())
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(snapshot))
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    #[serde(default)]
    password: Option<String>,
}

async fn admin_reset(
    State(state): State<AppState>,
    body: Result<Json<ResetRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let supplied = body.ok().and_then(|Json(request)| request.password);
    let authorized = match (&state.admin_password, &supplied) {
        (Some(expected), Some(given)) => passwords_match(expected.as_bytes(), given.as_bytes()),
        _ => false,
    };
    if !authorized {
        warn!("rejected admin reset");
        return Ok((StatusCode::UNAUTHORIZED, Json(json!({ "success": false }))));
    }

    let pipeline = state.pipeline.clone();
    task::spawn_blocking(move || pipeline.reset())
        .await
        .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
        .map_err(|err| ApiError::internal(err.to_string()))?;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/// Compares every byte of the configured password regardless of where the
/// first mismatch is, so timing only reveals its length.
fn passwords_match(expected: &[u8], given: &[u8]) -> bool {
    let mut diff = expected.len() ^ given.len();
    for (i, byte) in expected.iter().enumerate() {
        diff |= usize::from(byte ^ given.get(i).copied().unwrap_or(0));
    }
    diff == 0
}

/// Peer address, or the first `X-Forwarded-For` hop when running behind a
/// trusted proxy.
fn client_id(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use reelgrab::resolver::Extraction;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedExtractor {
        media_url: String,
        calls: AtomicUsize,
    }

    impl FixedExtractor {
        fn new(media_url: &str) -> Arc<Self> {
            Arc::new(Self {
                media_url: media_url.into(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Extractor for FixedExtractor {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn extract(&self, _source_url: &str) -> Result<Extraction, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Extraction {
                media_url: self.media_url.clone(),
                title: Some("Sunset".into()),
                author: Some("alice".into()),
            })
        }
    }

    fn test_state(extractor: Arc<dyn Extractor>, password: Option<&str>) -> AppState {
        let pipeline = Pipeline::new(
            extractor,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStats::new()),
        )
        .with_retry_delay(Duration::ZERO);
        AppState {
            pipeline: Arc::new(pipeline),
            relay: Arc::new(StreamRelay::new(build_agent("test", Duration::from_secs(5)))),
            admin_password: password.map(Arc::from),
            disposition: Disposition::Attachment,
            trust_proxy: false,
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    struct Reply {
        status: u16,
        content_type: Option<String>,
        disposition: Option<String>,
        body: Vec<u8>,
    }

    impl Reply {
        fn json(&self) -> Value {
            serde_json::from_slice(&self.body).unwrap()
        }

        fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    fn into_reply(outcome: Result<ureq::Response, ureq::Error>) -> Reply {
        let response = match outcome {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(err) => panic!("transport error: {err}"),
        };
        let status = response.status();
        let content_type = response.header("content-type").map(str::to_owned);
        let disposition = response.header("content-disposition").map(str::to_owned);
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).unwrap();
        Reply {
            status,
            content_type,
            disposition,
            body,
        }
    }

    async fn post_json(url: String, body: Value) -> Reply {
        task::spawn_blocking(move || into_reply(ureq::post(&url).send_json(body)))
            .await
            .unwrap()
    }

    async fn post_raw(url: String, body: &'static str) -> Reply {
        task::spawn_blocking(move || {
            into_reply(
                ureq::post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(body),
            )
        })
        .await
        .unwrap()
    }

    async fn get_url(url: String, query: Option<(&'static str, String)>) -> Reply {
        task::spawn_blocking(move || {
            let mut request = ureq::get(&url);
            if let Some((key, value)) = &query {
                request = request.query(key, value);
            }
            into_reply(request.call())
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrong_domain_is_rejected_without_counting() {
        let extractor = FixedExtractor::new("https://cdn.example/v1.mp4");
        let base = serve(router(test_state(extractor.clone(), None))).await;

        let reply = post_json(
            format!("{base}/api/fetch"),
            json!({"url": "https://example.com/video"}),
        )
        .await;
        assert_eq!(reply.status, 400);
        assert_eq!(
            reply.json(),
            json!({"success": false, "message": "Invalid Instagram URL"})
        );

        let stats = get_url(format!("{base}/stats"), None).await.json();
        assert_eq!(stats["requests"], 0);
        assert_eq!(stats["downloads"], 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_fetch_is_served_from_cache() {
        let extractor = FixedExtractor::new("https://cdn.example/v1.mp4");
        let base = serve(router(test_state(extractor.clone(), None))).await;
        let body = json!({"url": "https://instagram.com/p/ABC123"});

        let first = post_json(format!("{base}/api/fetch"), body.clone()).await;
        assert_eq!(first.status, 200);
        assert_eq!(
            first.json(),
            json!({
                "success": true,
                "videoUrl": "https://cdn.example/v1.mp4",
                "title": "Sunset",
                "author_name": "alice",
                "cached": false,
            })
        );

        let second = post_json(format!("{base}/download"), body).await.json();
        assert_eq!(second["videoUrl"], "https://cdn.example/v1.mp4");
        assert_eq!(second["cached"], true);
        assert!(second.get("title").is_none());

        let stats = get_url(format!("{base}/stats"), None).await.json();
        assert_eq!(stats["requests"], 2);
        assert_eq!(stats["downloads"], 2);
        assert_eq!(stats["videos_served"], 2);
        assert_eq!(stats["cache_hits"], 1);
        assert_eq!(stats["unique_ips"], 1);
        assert_eq!(stats["download_logs"][0]["ip"], "127.0.0.1");
        assert_eq!(stats["download_logs"][1]["url"], "https://instagram.com/p/ABC123");
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_body_is_a_bad_request() {
        let base = serve(router(test_state(FixedExtractor::new("x"), None))).await;
        let reply = post_raw(format!("{base}/api/fetch"), "{not json").await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.json()["success"], false);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn admin_reset_requires_the_password() {
        let extractor = FixedExtractor::new("https://cdn.example/v1.mp4");
        let base = serve(router(test_state(extractor.clone(), Some("hunter2")))).await;
        let post = json!({"url": "https://instagram.com/p/ABC123"});
        post_json(format!("{base}/api/fetch"), post.clone()).await;

        let reset_url = format!("{base}/admin/reset");
        let denied = post_json(reset_url.clone(), json!({"password": "nope"})).await;
        assert_eq!(denied.status, 401);
        assert_eq!(denied.json(), json!({"success": false}));

        let granted = post_json(reset_url, json!({"password": "hunter2"})).await;
        assert_eq!(granted.status, 200);
        assert_eq!(granted.json(), json!({"success": true}));

        let stats = get_url(format!("{base}/stats"), None).await.json();
        assert_eq!(stats["requests"], 0);
        assert_eq!(stats["unique_ips"], 0);
        assert_eq!(stats["download_logs"], json!([]));

        let again = post_json(format!("{base}/api/fetch"), post).await.json();
        assert_eq!(again["cached"], false);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn admin_reset_is_disabled_without_a_password() {
        let base = serve(router(test_state(FixedExtractor::new("x"), None))).await;
        let reply = post_json(format!("{base}/admin/reset"), json!({"password": ""})).await;
        assert_eq!(reply.status, 401);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_relays_the_upstream_bytes() {
        let video: Vec<u8> = (0..(CHUNK_SIZE * 5 + 17)).map(|i| (i % 199) as u8).collect();
        let served = video.clone();
        let upstream = serve(Router::new().route(
            "/v1.mp4",
            get(move || {
                let served = served.clone();
                async move { served }
            }),
        ))
        .await;
        let base = serve(router(test_state(FixedExtractor::new("x"), None))).await;

        let reply = get_url(
            format!("{base}/api/download"),
            Some(("url", format!("{upstream}/v1.mp4"))),
        )
        .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type.as_deref(), Some("video/mp4"));
        let disposition = reply.disposition.clone().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"instagram_"));
        assert_eq!(reply.body, video);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_errors_are_plain_text() {
        let upstream = serve(Router::new().route(
            "/expired.mp4",
            get(|| async { (StatusCode::FORBIDDEN, "expired") }),
        ))
        .await;
        let base = serve(router(test_state(FixedExtractor::new("x"), None))).await;

        let missing = get_url(format!("{base}/proxy"), None).await;
        assert_eq!(missing.status, 400);
        assert_eq!(missing.text(), "Missing video url");

        let failed = get_url(
            format!("{base}/api/download"),
            Some(("url", format!("{upstream}/expired.mp4"))),
        )
        .await;
        assert_eq!(failed.status, 500);
        assert!(failed.text().starts_with("Failed to fetch video"));
        assert!(failed.content_type.unwrap().starts_with("text/plain"));
    }

    #[test]
    fn client_id_honours_forwarded_for_only_when_trusted() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_id(&headers, peer, false), "10.0.0.9");
        assert_eq!(client_id(&headers, peer, true), "203.0.113.7");
        assert_eq!(client_id(&HeaderMap::new(), peer, true), "10.0.0.9");
    }

    #[test]
    fn password_comparison_covers_prefixes_and_lengths() {
        assert!(passwords_match(b"hunter2", b"hunter2"));
        assert!(!passwords_match(b"hunter2", b"hunter"));
        assert!(!passwords_match(b"hunter2", b"hunter22"));
        assert!(!passwords_match(b"hunter2", b"Hunter2"));
        assert!(!passwords_match(b"hunter2", b""));
        assert!(passwords_match(b"", b""));
    }

    #[test]
    fn cli_overrides_parse() {
        let cli =
            Cli::try_parse_from(["backend", "--port", "9000", "--host", "127.0.0.1"]).unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host, Some("127.0.0.1".parse().unwrap()));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn auto_resolver_falls_back_to_scraping() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            ytdlp_path: dir.path().join("missing-yt-dlp"),
            store: StoreKind::Sqlite,
            db_path: dir.path().join("reelgrab.db"),
            ..RuntimeConfig::default()
        };
        let state = build_state(&config).unwrap();
        assert_eq!(state.pipeline.extractor_name(), "scrape");
        assert!(state.admin_password.is_none());
        assert!(dir.path().join("reelgrab.db").exists());
    }
}
