use crate::core::{MatchSettings, ScoringParams};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    /// Absent means the in-memory backend
    #[serde(default)]
    pub database: Option<DatabaseSettings>,
    /// JSON fixture file seeding the in-memory backend
    #[serde(default)]
    pub fixtures_path: Option<String>,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub lease: LeaseSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_request_timeout_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_capacity() -> u64 { 10_000 }
fn default_cache_ttl_secs() -> u64 { 86_400 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaseSettings {
    /// Shared Redis lease when set, process-local lease otherwise
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_min_skill_match_ratio")]
    pub min_skill_match_ratio: f64,
    #[serde(default = "default_experience_tolerance_years")]
    pub experience_tolerance_years: f64,
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f64,
    #[serde(default = "default_salary_buffer_ratio")]
    pub salary_buffer_ratio: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    #[serde(default = "default_qualitative_timeout_ms")]
    pub qualitative_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    #[serde(default = "default_persist_attempts")]
    pub persist_attempts: u32,
    #[serde(default = "default_persist_backoff_ms")]
    pub persist_backoff_ms: u64,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_true")]
    pub qualitative_enabled: bool,
    #[serde(default = "default_true")]
    pub location_matching_enabled: bool,
    #[serde(default = "default_true")]
    pub salary_matching_enabled: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_skill_match_ratio: default_min_skill_match_ratio(),
            experience_tolerance_years: default_experience_tolerance_years(),
            min_score_threshold: default_min_score_threshold(),
            salary_buffer_ratio: default_salary_buffer_ratio(),
            max_results: default_max_results(),
            fanout_concurrency: default_fanout_concurrency(),
            qualitative_timeout_ms: default_qualitative_timeout_ms(),
            max_concurrent_runs: default_max_concurrent_runs(),
            persist_attempts: default_persist_attempts(),
            persist_backoff_ms: default_persist_backoff_ms(),
            lease_ttl_secs: default_lease_ttl_secs(),
            qualitative_enabled: true,
            location_matching_enabled: true,
            salary_matching_enabled: true,
        }
    }
}

fn default_min_skill_match_ratio() -> f64 { 0.3 }
fn default_experience_tolerance_years() -> f64 { 2.0 }
fn default_min_score_threshold() -> f64 { 0.5 }
fn default_salary_buffer_ratio() -> f64 { 0.10 }
fn default_max_results() -> usize { 10 }
fn default_fanout_concurrency() -> usize { 5 }
fn default_qualitative_timeout_ms() -> u64 { 30_000 }
fn default_max_concurrent_runs() -> usize { 4 }
fn default_persist_attempts() -> u32 { 3 }
fn default_persist_backoff_ms() -> u64 { 200 }
fn default_lease_ttl_secs() -> u64 { 900 }
fn default_true() -> bool { true }

impl MatchingSettings {
    /// Reject values the matching engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("min_skill_match_ratio", self.min_skill_match_ratio),
            ("min_score_threshold", self.min_score_threshold),
            ("salary_buffer_ratio", self.salary_buffer_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("matching.{} must be within [0, 1], got {}", name, value)));
            }
        }

        if !(self.experience_tolerance_years > 0.0) {
            return Err(invalid(format!(
                "matching.experience_tolerance_years must be positive, got {}",
                self.experience_tolerance_years
            )));
        }

        let counts = [
            ("max_results", self.max_results),
            ("fanout_concurrency", self.fanout_concurrency),
            ("max_concurrent_runs", self.max_concurrent_runs),
            ("persist_attempts", self.persist_attempts as usize),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(invalid(format!("matching.{} must be at least 1", name)));
            }
        }

        if self.qualitative_timeout_ms == 0 {
            return Err(invalid("matching.qualitative_timeout_ms must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Orchestrator settings derived from this section
    pub fn to_match_settings(&self) -> MatchSettings {
        MatchSettings {
            params: ScoringParams {
                min_skill_match_ratio: self.min_skill_match_ratio,
                experience_tolerance_years: self.experience_tolerance_years,
                min_score_threshold: self.min_score_threshold,
                salary_buffer_ratio: self.salary_buffer_ratio,
                location_matching_enabled: self.location_matching_enabled,
                salary_matching_enabled: self.salary_matching_enabled,
            },
            max_results: self.max_results,
            fanout_concurrency: self.fanout_concurrency,
            qualitative_timeout: Duration::from_millis(self.qualitative_timeout_ms),
            qualitative_enabled: self.qualitative_enabled,
            persist_attempts: self.persist_attempts,
            persist_backoff: Duration::from_millis(self.persist_backoff_ms),
        }
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Message(message)
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

/// Output layout of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Unknown names fall back to compact text
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with MATCHER__)
    /// 5. DATABASE_URL, OPENAI_API_KEY and REDIS_URL
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MATCHER__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("MATCHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::finish(apply_well_known_env(builder)?)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("MATCHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.matching.validate()?;
        Ok(settings)
    }
}

/// Apply the conventional unprefixed variables on top of everything else
fn apply_well_known_env(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    use std::env;

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        builder = builder.set_override("openai.api_key", key)?;
    }
    if let Ok(url) = env::var("REDIS_URL") {
        builder = builder.set_override("lease.redis_url", url)?;
    }

    Ok(builder)
}
