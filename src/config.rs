//! Process configuration
//!
//! Built once in `main` from defaults, environment variables and command-line
//! overrides, then passed by reference to everything that needs a path or the
//! backend address.

use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

/// Backend connection settings
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Data root holding `personas/` and `logs/`
    pub home: PathBuf,
    pub ollama: OllamaConfig,
}

impl AppConfig {
    /// Read environment variables over the defaults.
    ///
    /// `cwd` is the working directory captured at startup, used when
    /// `PERSONA_AGENT_HOME` is unset.
    pub fn from_env(cwd: &Path) -> Self {
        Self::from_lookup(cwd, |key| std::env::var(key).ok())
    }

    fn from_lookup(cwd: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = lookup("PERSONA_AGENT_HOME").map_or_else(|| cwd.to_path_buf(), PathBuf::from);
        let base_url = lookup("OLLAMA_HOST")
            .map_or_else(|| DEFAULT_OLLAMA_URL.to_string(), |h| normalize_base_url(&h));

        Self {
            home,
            ollama: OllamaConfig {
                base_url,
                connect_timeout: seconds(
                    &lookup,
                    "PERSONA_AGENT_CONNECT_TIMEOUT_SECS",
                    DEFAULT_CONNECT_TIMEOUT_SECS,
                ),
                request_timeout: seconds(
                    &lookup,
                    "PERSONA_AGENT_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                ),
            },
        }
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, home: Option<PathBuf>, ollama_url: Option<&str>) -> Self {
        if let Some(home) = home {
            self.home = home;
        }
        if let Some(url) = ollama_url {
            self.ollama.base_url = normalize_base_url(url);
        }
        self
    }

    pub fn personas_dir(&self) -> PathBuf {
        self.home.join("personas")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("logs")
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Duration {
    let secs = match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "Invalid timeout, using default");
            default
        }),
    };
    Duration::from_secs(secs)
}

/// Accept `host:port` as well as full URLs
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}
