use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Production,
}

const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "127.0.0.1",
    "localhost",
    "find-my-banquet-6wqy.onrender.com",
    "find-banquet.onrender.com",
    "findmybanquet.com",
    "www.findmybanquet.com",
];

/// Runtime settings: an optional TOML file overlaid by environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub bind_addr: String,
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub allowed_hosts: Vec<String>,
    /// Origins allowed by CORS; derived from `allowed_hosts` when empty.
    pub trusted_origins: Vec<String>,
    pub static_root: PathBuf,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: u64,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            bind_addr: "0.0.0.0:8000".to_string(),
            database_url: "db.sqlite3".to_string(),
            database_auth_token: None,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            trusted_origins: Vec::new(),
            static_root: PathBuf::from("static"),
            media_root: PathBuf::from("media"),
            max_upload_bytes: 5 * 1024 * 1024,
            session_ttl_secs: 60 * 60 * 24 * 14,
            log_dir: PathBuf::from("logs"),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load `BANQUET_CONFIG` (default `config.toml`) if present, then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BANQUET_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let base = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env) = lookup("ENVIRONMENT") {
            self.environment = match env.trim().to_lowercase().as_str() {
                "production" => Environment::Production,
                "local" | "development" | "" => Environment::Local,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "ENVIRONMENT",
                        value: env,
                    })
                }
            };
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(token) = lookup("DATABASE_AUTH_TOKEN") {
            self.database_auth_token = Some(token);
        }
        if let Some(hosts) = lookup("ALLOWED_HOSTS") {
            self.allowed_hosts = split_list(&hosts);
        }
        if let Some(origins) = lookup("CSRF_TRUSTED_ORIGINS") {
            self.trusted_origins = split_list(&origins);
        }
        if let Some(root) = lookup("STATIC_ROOT") {
            self.static_root = PathBuf::from(root);
        }
        if let Some(root) = lookup("MEDIA_ROOT") {
            self.media_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup("MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "MAX_UPLOAD_BYTES",
                value: raw,
            })?;
        }
        if let Some(raw) = lookup("SESSION_TTL_SECS") {
            self.session_ttl_secs = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                value: raw,
            })?;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// CORS origins: explicit list, or `https://{host}` for every public host.
    pub fn cors_origins(&self) -> Vec<String> {
        if !self.trusted_origins.is_empty() {
            return self.trusted_origins.clone();
        }
        self.allowed_hosts
            .iter()
            .filter(|h| !matches!(h.as_str(), "127.0.0.1" | "localhost" | "*"))
            .map(|h| format!("https://{h}"))
            .collect()
    }

    /// Whole-request limit: room for a handful of images plus the text fields.
    pub fn max_request_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_mul(10).saturating_add(1024 * 1024)
    }

    pub fn host_allowed(&self, host: &str) -> bool {
        let Some(host) = host_without_port(host) else {
            return false;
        };
        self.allowed_hosts.iter().any(|allowed| {
            allowed == "*"
                || allowed.eq_ignore_ascii_case(host)
                || allowed
                    .strip_prefix('.')
                    .map_or(false, |suffix| {
                        host.eq_ignore_ascii_case(suffix)
                            || host.to_ascii_lowercase().ends_with(&format!(".{}", suffix.to_ascii_lowercase()))
                    })
        })
    }
}

/// Host name with any port stripped, or None for an unterminated IPv6 literal.
fn host_without_port(host: &str) -> Option<&str> {
    if host.starts_with('[') {
        // IPv6 literal: [::1]:8000
        return host.find(']').map(|end| &host[..=end]);
    }
    Some(host.rsplit_once(':').map_or(host, |(name, _)| name))
}
