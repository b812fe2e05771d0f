use crate::features::{Tokenizer, WordTokenizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    pub logging: Option<LoggingConfig>,
    pub domain_age: DomainAgeConfig,
    pub tokenizer: TokenizerConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainAgeConfig {
    /// Bounds each WHOIS connect and read
    pub timeout_seconds: u64,
    /// Bounds the whole per-host lookup, fallback servers and DNS included
    pub lookup_budget_seconds: u64,
    /// Answer from `mock_domains` instead of querying WHOIS
    pub use_mock_data: bool,
    /// Host -> age in days
    pub mock_domains: HashMap<String, i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Token regex. An invalid pattern leaves linguistic analysis degraded.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub high_risk_threshold: u32,
    pub top_findings: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "threat_analysis_data.db".to_string(),
            logging: None,
            domain_age: DomainAgeConfig::default(),
            tokenizer: TokenizerConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for DomainAgeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            lookup_budget_seconds: 60,
            use_mock_data: false,
            mock_domains: HashMap::from([
                ("example.com".to_string(), 8000),
                ("google.com".to_string(), 9000),
                ("suspicious.tk".to_string(), 12),
            ]),
        }
    }
}

impl DomainAgeConfig {
    /// Per-host bound; never shorter than a single WHOIS round trip.
    pub fn lookup_budget(&self) -> Duration {
        Duration::from_secs(self.lookup_budget_seconds.max(self.timeout_seconds))
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: 50,
            top_findings: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl Config {
    pub fn default_path() -> &'static str {
        "/etc/threat-analyzer.yaml"
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Missing files fall back to defaults; unreadable or invalid ones are errors.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Build the tokenizer capability. `None` means it could not be loaded.
    pub fn load_tokenizer(&self) -> Option<Arc<dyn Tokenizer>> {
        match &self.tokenizer.pattern {
            None => Some(Arc::new(WordTokenizer::default())),
            Some(pattern) => match WordTokenizer::with_pattern(pattern) {
                Ok(tokenizer) => Some(Arc::new(tokenizer)),
                Err(e) => {
                    log::error!("Failed to load tokenizer pattern {pattern:?}: {e}");
                    None
                }
            },
        }
    }
}
