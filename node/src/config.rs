//! Bot configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gatekeeper_store_lmdb::DEFAULT_MAP_SIZE;
use gatekeeper_types::UserId;

use crate::logging::LogFormat;
use crate::AdmissionError;

/// Configuration for the admission bot.
///
/// Loaded from a TOML file via [`BotConfig::from_toml_file`], overridden by
/// CLI flags and environment in the daemon, or built directly in tests.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot API token. Usually supplied through `BOT_TOKEN` rather than the file.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// User id of the single administrator.
    #[serde(default)]
    pub admin_id: i64,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Region assumed for numbers shared without a `+` country prefix.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Seeded into the `default` policy scope when it is empty at startup.
    #[serde(default = "default_allowed_regions")]
    pub default_allowed_regions: Vec<String>,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum age of the group registry before the dispatcher reloads it.
    #[serde(default = "default_registry_refresh_secs")]
    pub registry_refresh_secs: u64,

    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./gatekeeper_data")
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_region() -> String {
    "PH".to_string()
}

fn default_allowed_regions() -> Vec<String> {
    vec!["PH".to_string()]
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    40
}

fn default_registry_refresh_secs() -> u64 {
    300
}

fn default_lmdb_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl BotConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, AdmissionError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AdmissionError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, AdmissionError> {
        toml::from_str(s).map_err(|e| AdmissionError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, AdmissionError> {
        toml::to_string_pretty(self).map_err(|e| AdmissionError::Config(e.to_string()))
    }

    /// Refuse to start without credentials or with unusable settings.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.bot_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(AdmissionError::MissingCredential("bot_token"));
        }
        if self.admin_id <= 0 {
            return Err(AdmissionError::MissingCredential("admin_id"));
        }
        if self.default_allowed_regions.iter().all(|c| c.trim().is_empty()) {
            return Err(AdmissionError::Config(
                "default_allowed_regions must name at least one region".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AdmissionError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn admin(&self) -> UserId {
        UserId::new(self.admin_id)
    }

    pub fn log_format(&self) -> Result<LogFormat, AdmissionError> {
        self.log_format.parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("admin_id", &self.admin_id)
            .field("data_dir", &self.data_dir)
            .field("api_base_url", &self.api_base_url)
            .field("default_region", &self.default_region)
            .field("default_allowed_regions", &self.default_allowed_regions)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("registry_refresh_secs", &self.registry_refresh_secs)
            .field("lmdb_map_size", &self.lmdb_map_size)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_id: 0,
            data_dir: default_data_dir(),
            api_base_url: default_api_base_url(),
            default_region: default_region(),
            default_allowed_regions: default_allowed_regions(),
            poll_timeout_secs: default_poll_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            registry_refresh_secs: default_registry_refresh_secs(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> BotConfig {
        BotConfig {
            bot_token: Some("123:abc".into()),
            admin_id: 99,
            ..BotConfig::default()
        }
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = BotConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.api_base_url, "https://api.telegram.org");
        assert_eq!(config.default_allowed_regions, ["PH"]);
        assert_eq!(config.registry_refresh_secs, 300);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            admin_id = 42
            default_allowed_regions = ["PH", "SG"]
            poll_timeout_secs = 10
        "#;
        let config = BotConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.admin(), UserId::new(42));
        assert_eq!(config.default_allowed_regions, ["PH", "SG"]);
        assert_eq!(config.poll_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 40);
    }

    #[test]
    fn written_config_parses_back() {
        let config = with_credentials();
        let parsed = BotConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed.admin_id, 99);
        assert_eq!(parsed.data_dir, config.data_dir);
    }

    #[test]
    fn refuses_to_start_without_credentials() {
        assert!(matches!(
            BotConfig::default().validate(),
            Err(AdmissionError::MissingCredential("bot_token"))
        ));
        let no_admin = BotConfig {
            admin_id: 0,
            ..with_credentials()
        };
        assert!(matches!(
            no_admin.validate(),
            Err(AdmissionError::MissingCredential("admin_id"))
        ));
        let blank_token = BotConfig {
            bot_token: Some("  ".into()),
            ..with_credentials()
        };
        assert!(matches!(
            blank_token.validate(),
            Err(AdmissionError::MissingCredential("bot_token"))
        ));
        assert!(with_credentials().validate().is_ok());
    }

    #[test]
    fn rejects_unusable_settings() {
        let no_regions = BotConfig {
            default_allowed_regions: vec![],
            ..with_credentials()
        };
        assert!(matches!(no_regions.validate(), Err(AdmissionError::Config(_))));
        let bad_format = BotConfig {
            log_format: "xml".into(),
            ..with_credentials()
        };
        assert!(bad_format.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", with_credentials());
        assert!(!rendered.contains("123:abc"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let err = BotConfig::from_toml_file("/nonexistent/gatekeeper.toml").unwrap_err();
        assert!(matches!(err, AdmissionError::Config(_)));
    }
}
