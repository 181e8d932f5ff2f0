//! Application configuration for Dealboard.
//!
//! User config lives at `~/.dealboard/dealboard.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DealboardError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dealboard.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dealboard";

// ---------------------------------------------------------------------------
// Config structs (matching dealboard.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Search provider settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Search cache TTLs.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Per-model pricing overrides, merged over built-in rates.
    #[serde(default)]
    pub pricing: Vec<PricingEntry>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path to the local database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Entities processed concurrently per wave.
    #[serde(default = "default_wave_size")]
    pub wave_size: u32,

    /// Pause between waves, in milliseconds.
    #[serde(default = "default_wave_delay_ms")]
    pub wave_delay_ms: u64,

    /// Maximum characters of search context handed to the model.
    #[serde(default = "default_context_max_chars")]
    pub context_max_chars: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            wave_size: default_wave_size(),
            wave_delay_ms: default_wave_delay_ms(),
            context_max_chars: default_context_max_chars(),
        }
    }
}

fn default_db_path() -> String {
    "~/.dealboard/dealboard.db".into()
}
fn default_wave_size() -> u32 {
    4
}
fn default_wave_delay_ms() -> u64 {
    1000
}
fn default_context_max_chars() -> usize {
    6000
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_api_key_env")]
    pub api_key_env: String,

    /// Search API base URL.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Search depth: "basic" or "advanced".
    #[serde(default = "default_search_depth")]
    pub depth: String,

    /// Maximum documents per query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_api_key_env(),
            base_url: default_search_base_url(),
            depth: default_search_depth(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_api_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_search_depth() -> String {
    "basic".into()
}
fn default_max_results() -> u32 {
    5
}
fn default_search_timeout_secs() -> u64 {
    30
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat completions base URL.
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,

    /// Default model to use for synthesis.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Completion token cap per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Retries after the first synthesis attempt fails.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base delay for linear retry backoff, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Request timeout in seconds.
    #[serde(default = "default_openrouter_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_openrouter_base_url(),
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retries: default_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_secs: default_openrouter_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_openrouter_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f64 {
    0.2
}
fn default_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_openrouter_timeout_secs() -> u64 {
    60
}

/// `[cache]` section. TTLs are per entity type; 0 disables expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Product search results stay fresh this long.
    #[serde(default = "default_product_ttl_days")]
    pub product_ttl_days: u32,

    /// Investor search results stay fresh this long.
    #[serde(default = "default_investor_ttl_days")]
    pub investor_ttl_days: u32,

    /// Season search results stay fresh this long.
    #[serde(default = "default_season_ttl_days")]
    pub season_ttl_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            product_ttl_days: default_product_ttl_days(),
            investor_ttl_days: default_investor_ttl_days(),
            season_ttl_days: default_season_ttl_days(),
        }
    }
}

fn default_product_ttl_days() -> u32 {
    30
}
fn default_investor_ttl_days() -> u32 {
    90
}
fn default_season_ttl_days() -> u32 {
    180
}

/// `[[pricing]]` entry — per-million-token rates for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingEntry {
    /// Model name as sent to the provider.
    pub model: String,
    /// USD per million prompt tokens.
    pub input_per_million: f64,
    /// USD per million completion tokens.
    pub output_per_million: f64,
}

// ---------------------------------------------------------------------------
// Enrich settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime enrichment settings — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    /// Entities processed concurrently per wave.
    pub wave_size: u32,
    /// Pause between waves, in milliseconds.
    pub wave_delay_ms: u64,
    /// Maximum characters of combined search context.
    pub context_max_chars: usize,
    /// Search depth passed to the provider.
    pub search_depth: String,
    /// Maximum documents per search query.
    pub max_results: u32,
    /// Model name for synthesis.
    pub model: String,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Retries after the first failed synthesis attempt.
    pub retries: u32,
    /// Base delay for linear retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
}

impl From<&AppConfig> for EnrichSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            wave_size: config.defaults.wave_size,
            wave_delay_ms: config.defaults.wave_delay_ms,
            context_max_chars: config.defaults.context_max_chars,
            search_depth: config.search.depth.clone(),
            max_results: config.search.max_results,
            model: config.openrouter.default_model.clone(),
            max_tokens: config.openrouter.max_tokens,
            temperature: config.openrouter.temperature,
            retries: config.openrouter.retries,
            retry_base_delay_ms: config.openrouter.retry_base_delay_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dealboard/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DealboardError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dealboard/dealboard.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DealboardError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DealboardError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DealboardError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DealboardError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DealboardError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured database path, expanding a leading `~/`.
pub fn resolve_db_path(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.db_path;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DealboardError::config("could not determine home directory"))?;
        return Ok(home.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Check that the search API key env var is set and non-empty.
pub fn validate_search_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.search.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(DealboardError::config(format!(
            "search API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://app.tavily.com"
        ))),
    }
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_openrouter_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(DealboardError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("TAVILY_API_KEY"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("wave_size"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.wave_size, 4);
        assert_eq!(parsed.cache.product_ttl_days, 30);
        assert_eq!(parsed.cache.investor_ttl_days, 90);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
wave_size = 8

[[pricing]]
model = "anthropic/claude-sonnet-4.5"
input_per_million = 3.0
output_per_million = 15.0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.wave_size, 8);
        assert_eq!(config.defaults.wave_delay_ms, 1000);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.pricing.len(), 1);
        assert_eq!(config.pricing[0].model, "anthropic/claude-sonnet-4.5");
    }

    #[test]
    fn enrich_settings_from_app_config() {
        let app = AppConfig::default();
        let settings = EnrichSettings::from(&app);
        assert_eq!(settings.wave_size, 4);
        assert_eq!(settings.retries, 2);
        assert_eq!(settings.context_max_chars, 6000);
        assert_eq!(settings.search_depth, "basic");
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "DB_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_openrouter_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn db_path_tilde_expansion() {
        let config = AppConfig::default();
        let path = resolve_db_path(&config).expect("resolve");
        assert!(path.ends_with(".dealboard/dealboard.db"));
        assert!(!path.to_string_lossy().contains('~'));
    }
}
