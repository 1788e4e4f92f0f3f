use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use estatehub_api::BackendConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl MatchingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl HubConfig {
    /// Defaults for everything but the backend address.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::new(base_url),
            matching: MatchingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Expand `${VAR}` placeholders from the environment. Unset variables expand
/// to an empty string; an unclosed placeholder is kept verbatim.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        output.push_str(&std::env::var(&candidate[..end]).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

fn resolve_backend_env(backend: &mut BackendConfig) {
    backend.base_url = resolve_env_var(&backend.base_url);
    backend.csrf_token = backend
        .csrf_token
        .as_deref()
        .map(resolve_env_var)
        .filter(|t| !t.is_empty());
}

pub fn load_config(path: &Path) -> Result<HubConfig> {
    let mut config: HubConfig = read_yaml_file(path)?;
    resolve_backend_env(&mut config.backend);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &HubConfig) -> Result<()> {
    let base = config.backend.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(anyhow!(
            "backend.base_url must start with http:// or https://: {:?}",
            config.backend.base_url
        ));
    }
    if config.backend.timeout_secs == 0 {
        return Err(anyhow!("backend.timeout_secs must be greater than zero"));
    }
    if config.matching.debounce_ms == 0 {
        return Err(anyhow!("matching.debounce_ms must be greater than zero"));
    }
    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}
