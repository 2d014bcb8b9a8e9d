//! Gateway configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables, so a bare `memgate serve` works with no file at all.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 37888
//!
//! [upstream]
//! host = "127.0.0.1"
//! port = 37777
//! # timeout_secs = 30
//!
//! [guides]
//! index = ".taskmaster/docs/file-guides/_SORT_BY_FILENAME.tsv"
//! cache_ttl_ms = 5000
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub guides: GuidesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the memory worker lives.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_worker_port")]
    pub port: u16,
    /// Per-call timeout. `None` leaves the transport defaults in place,
    /// which means a hung worker holds the request open.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_worker_port(),
            timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuidesConfig {
    #[serde(default = "default_index_path")]
    pub index: PathBuf,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Base directory for relative sidecar paths. Defaults to the process
    /// working directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for GuidesConfig {
    fn default() -> Self {
        Self {
            index: default_index_path(),
            cache_ttl_ms: default_cache_ttl_ms(),
            root: None,
        }
    }
}

impl GuidesConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn root_dir(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_gateway_port() -> u16 {
    37888
}
fn default_worker_port() -> u16 {
    37777
}
fn default_body_limit() -> usize {
    1_048_576
}
fn default_index_path() -> PathBuf {
    PathBuf::from(".taskmaster/docs/file-guides/_SORT_BY_FILENAME.tsv")
}
fn default_cache_ttl_ms() -> u64 {
    5000
}

/// Loads configuration from `path` (if given), then applies environment
/// overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Applies `MEMORY_*` overrides using `lookup` to resolve variable names.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("MEMORY_GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("MEMORY_GATEWAY_PORT") {
        config.server.port = parse_var("MEMORY_GATEWAY_PORT", &port)?;
    }
    if let Some(host) = lookup("MEMORY_WORKER_HOST") {
        config.upstream.host = host;
    }
    if let Some(port) = lookup("MEMORY_WORKER_PORT") {
        config.upstream.port = parse_var("MEMORY_WORKER_PORT", &port)?;
    }
    if let Some(secs) = lookup("MEMORY_WORKER_TIMEOUT_SECS") {
        config.upstream.timeout_secs = Some(parse_var("MEMORY_WORKER_TIMEOUT_SECS", &secs)?);
    }
    if let Some(index) = lookup("MEMORY_GUIDES_INDEX") {
        config.guides.index = PathBuf::from(index);
    }
    if let Some(ttl) = lookup("MEMORY_GUIDES_CACHE_TTL_MS") {
        config.guides.cache_ttl_ms = parse_var("MEMORY_GUIDES_CACHE_TTL_MS", &ttl)?;
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer, got '{}'", key, value))
}

fn validate(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        bail!("server.port must be > 0");
    }
    if config.upstream.port == 0 {
        bail!("upstream.port must be > 0");
    }
    if config.server.body_limit_bytes == 0 {
        bail!("server.body_limit_bytes must be > 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:37888");
        assert_eq!(config.upstream.base_url(), "http://127.0.0.1:37777");
        assert_eq!(config.guides.cache_ttl(), Duration::from_millis(5000));
        assert_eq!(config.server.body_limit_bytes, 1_048_576);
        assert!(config.upstream.timeout().is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[upstream]
port = 9000

[guides]
index = "/tmp/guides.tsv"
"#,
        )
        .unwrap();
        assert_eq!(config.upstream.base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.guides.index, PathBuf::from("/tmp/guides.tsv"));
        assert_eq!(config.guides.cache_ttl_ms, 5000);
        assert_eq!(config.server.port, 37888);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MEMORY_GATEWAY_PORT", "4000"),
            ("MEMORY_WORKER_HOST", "worker.local"),
            ("MEMORY_GUIDES_CACHE_TTL_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.upstream.base_url(), "http://worker.local:37777");
        assert_eq!(config.guides.cache_ttl_ms, 250);
    }

    #[test]
    fn test_bad_env_override_is_error() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, |k| {
            (k == "MEMORY_WORKER_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("MEMORY_WORKER_PORT"));
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate(&config).is_err());
    }
}
