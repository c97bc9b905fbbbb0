use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use lala_client::ClientConfig;
use poller_actor::ActorConfig;
use types::DeviceIdentity;

const DEFAULT_RESPAWN_DELAY_MS: u64 = 1_000;
const MIN_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub device: DeviceIdentity,
    pub http: ClientConfig,
    pub poller: ActorConfig,
    /// SQLite file for acknowledged states; in-memory when unset.
    pub store_path: Option<String>,
    pub respawn_delay_ms: u64,
    /// Address for the `/metrics` and `/health` endpoint; disabled when unset.
    pub listen: Option<String>,
}

impl CollectorConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_host(&self.device.host)?;
        if self.poller.poll_interval.as_secs() == 0 {
            anyhow::bail!("poller.interval_secs must be >= 1");
        }
        if self.http.timeout_ms == 0 {
            anyhow::bail!("http.timeout_ms must be >= 1");
        }
        if self.http.retry_backoff_ms == 0 {
            anyhow::bail!("http.retry_backoff_ms must be >= 1");
        }
        if self.http.retry_max_backoff_ms < self.http.retry_backoff_ms {
            anyhow::bail!("http.retry_max_backoff_ms must be >= http.retry_backoff_ms");
        }
        if self.respawn_delay_ms == 0 {
            anyhow::bail!("respawn_delay_ms must be >= 1");
        }
        if let Some(ref path) = self.store_path {
            if path.trim().is_empty() {
                anyhow::bail!("store.path must be non-empty when set");
            }
        }
        if let Some(ref listen) = self.listen {
            listen.parse::<SocketAddr>().map_err(|_| {
                anyhow::anyhow!("server.listen must be a socket address (e.g. 0.0.0.0:9184)")
            })?;
        }

        Ok(())
    }

    /// Delay before a failed poller is restarted. Never shorter than the poll
    /// interval, so an unreachable device is probed at most once per interval.
    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms).max(self.poller.poll_interval)
    }

    /// Time a poller gets to finish an in-flight fetch, retries included, on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        let attempts = self.http.retry_count as u64 + 1;
        let fetch_ms = self
            .http
            .timeout_ms
            .saturating_mul(attempts)
            .saturating_add(self.http.retry_max_backoff_ms.saturating_mul(attempts - 1));
        Duration::from_millis(fetch_ms.saturating_add(1_000)).max(MIN_SHUTDOWN_GRACE)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            device: DeviceIdentity::new(""),
            http: ClientConfig::default(),
            poller: ActorConfig::default(),
            store_path: None,
            respawn_delay_ms: DEFAULT_RESPAWN_DELAY_MS,
            listen: None,
        }
    }
}

fn apply_env_overrides(config: &mut CollectorConfig) {
    if let Ok(value) = env::var("SENEC_HOST") {
        config.device = DeviceIdentity::new(value);
    }

    if let Some(interval) = parse_env_u64("SENEC_INTERVAL_SECS") {
        config.poller.poll_interval = Duration::from_secs(interval);
    }

    if let Some(timeout_ms) = parse_env_u64("SENEC_TIMEOUT_MS") {
        config.http.timeout_ms = timeout_ms;
    }

    if let Some(retry_count) = parse_env_usize("SENEC_RETRY_COUNT") {
        config.http.retry_count = retry_count;
    }

    if let Some(insecure) = parse_env_bool("SENEC_ACCEPT_INVALID_CERTS") {
        config.http.accept_invalid_certs = insecure;
    }

    config.store_path = env::var("SENEC_STORE_PATH").ok().or(config.store_path.take());
    config.listen = env::var("SENEC_LISTEN").ok().or(config.listen.take());
    config.respawn_delay_ms =
        parse_env_u64("SENEC_RESPAWN_DELAY_MS").unwrap_or(config.respawn_delay_ms);
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    device: Option<FileDeviceConfig>,
    poller: Option<FilePollerConfig>,
    http: Option<ClientConfig>,
    store: Option<FileStoreConfig>,
    server: Option<FileServerConfig>,
    respawn_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileDeviceConfig {
    host: String,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileStoreConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileServerConfig {
    listen: Option<String>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("SENEC_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut CollectorConfig, file: FileConfig) {
    if let Some(device) = file.device {
        config.device = DeviceIdentity::new(device.host);
    }

    if let Some(poller) = file.poller {
        if let Some(interval) = poller.interval_secs {
            config.poller.poll_interval = Duration::from_secs(interval);
        }
    }

    if let Some(http) = file.http {
        config.http = http;
    }

    if let Some(store) = file.store {
        config.store_path = store.path;
    }

    if let Some(server) = file.server {
        config.listen = server.listen;
    }

    if let Some(delay) = file.respawn_delay_ms {
        config.respawn_delay_ms = delay;
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn validate_host(value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("device.host must be set (e.g. 192.168.1.50)");
    }
    if trimmed.chars().any(char::is_whitespace) {
        anyhow::bail!("device.host must not contain whitespace");
    }
    let authority = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    if authority.is_empty() {
        anyhow::bail!("device.host must name a device");
    }
    if authority.contains('/') {
        anyhow::bail!("device.host must not contain a path; lala.cgi is appended automatically");
    }
    Ok(())
}
