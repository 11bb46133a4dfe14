//! Runtime configuration.
//!
//! Values come from a `KEY=VALUE` env file (default `/etc/reelgrab-env`),
//! overridden by process environment variables, overridden in turn by the
//! backend's command-line flags.

use anyhow::{Context, Result, anyhow, bail};
use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::relay::Disposition;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/reelgrab-env";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_YTDLP: &str = "yt-dlp";
pub const DEFAULT_DB_PATH: &str = "reelgrab.db";
pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://api.instagram.com/oembed";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Which extraction strategy backs `/api/fetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// yt-dlp when it is installed, scraping otherwise.
    Auto,
    YtDlp,
    Scrape,
    OEmbed,
}

impl FromStr for ResolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ytdlp" | "yt-dlp" => Ok(Self::YtDlp),
            "scrape" => Ok(Self::Scrape),
            "oembed" => Ok(Self::OEmbed),
            other => {
                bail!("unknown resolver {other:?} (expected auto, ytdlp, scrape or oembed)")
            }
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::YtDlp => "ytdlp",
            Self::Scrape => "scrape",
            Self::OEmbed => "oembed",
        })
    }
}

/// Where the cache and counters live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => bail!("unknown store {other:?} (expected memory or sqlite)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    pub resolver: ResolverKind,
    pub ytdlp_path: PathBuf,
    pub oembed_endpoint: String,
    pub oembed_enrich: bool,
    pub store: StoreKind,
    pub db_path: PathBuf,
    pub admin_password: Option<String>,
    pub disposition: Disposition,
    pub upstream_timeout: Duration,
    pub retry_delay: Duration,
    pub revalidate_cache: bool,
    pub user_agent: String,
    pub trust_proxy: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            resolver: ResolverKind::Auto,
            ytdlp_path: PathBuf::from(DEFAULT_YTDLP),
            oembed_endpoint: DEFAULT_OEMBED_ENDPOINT.to_string(),
            oembed_enrich: true,
            store: StoreKind::Memory,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            admin_password: None,
            disposition: Disposition::Attachment,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            revalidate_cache: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            trust_proxy: false,
        }
    }
}

/// Reads `KEY=VALUE` pairs, skipping blanks and `#` comments. Values may be
/// wrapped in double quotes. A missing file yields `None`.
pub fn read_env_file(path: &Path) -> Result<Option<HashMap<String, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    Ok(Some(parse_env_lines(&content)))
}

fn parse_env_lines(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            vars.insert(key.trim().to_string(), value.to_string());
        }
    }
    vars
}

/// Loads the env file at `path` and overlays the process environment.
pub fn load_runtime_config_from(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let file_vars = read_env_file(path)?.unwrap_or_default();
    RuntimeConfig::resolve(&file_vars, |key| std::env::var(key).ok())
}

impl RuntimeConfig {
    /// Builds the configuration from file values and an environment lookup.
    /// Non-empty environment values win over the file.
    pub fn resolve<F>(file_vars: &HashMap<String, String>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| -> Option<String> {
            env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .or_else(|| {
                    file_vars
                        .get(key)
                        .cloned()
                        .filter(|value| !value.is_empty())
                })
        };

        let mut cfg = Self::default();
        if let Some(host) = lookup("HOST") {
            cfg.host = host;
        }
        if let Some(port) = parse_key(&lookup, "PORT")? {
            cfg.port = port;
        }
        if let Some(resolver) = parse_key(&lookup, "RESOLVER")? {
            cfg.resolver = resolver;
        }
        if let Some(path) = lookup("YTDLP_PATH") {
            cfg.ytdlp_path = PathBuf::from(path);
        }
        if let Some(endpoint) = lookup("OEMBED_ENDPOINT") {
            cfg.oembed_endpoint = endpoint;
        }
        if let Some(enrich) = parse_flag(&lookup, "OEMBED_ENRICH")? {
            cfg.oembed_enrich = enrich;
        }
        if let Some(store) = parse_key(&lookup, "STORE")? {
            cfg.store = store;
        }
        if let Some(path) = lookup("DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        cfg.admin_password = lookup("ADMIN_PASSWORD");
        if let Some(disposition) = parse_key(&lookup, "DISPOSITION")? {
            cfg.disposition = disposition;
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "UPSTREAM_TIMEOUT_SECS")? {
            cfg.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parse_key::<u64, _>(&lookup, "RETRY_DELAY_MS")? {
            cfg.retry_delay = Duration::from_millis(millis);
        }
        if let Some(revalidate) = parse_flag(&lookup, "REVALIDATE_CACHE")? {
            cfg.revalidate_cache = revalidate;
        }
        if let Some(agent) = lookup("USER_AGENT") {
            cfg.user_agent = agent;
        }
        if let Some(trust) = parse_flag(&lookup, "TRUST_PROXY")? {
            cfg.trust_proxy = trust;
        }
        Ok(cfg)
    }
}

fn parse_key<T, L>(lookup: &L, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|err| anyhow!("Parsing {key}={raw:?}: {err}"))
        })
        .transpose()
}

fn parse_flag<L>(lookup: &L, key: &str) -> Result<Option<bool>>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("Parsing {key}={raw:?}: expected a boolean")),
        })
        .transpose()
}
