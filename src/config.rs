use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use clap::{Parser, ValueEnum};
use std::fs;
use tracing::{info, warn};

/// Secret used when none is configured; tokens signed with it are not private
pub const DEFAULT_JWT_SECRET: &str = "change-me";

/// Which hosted model backs the explanation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Explanations fall back to a fixed message
    #[default]
    None,
    Openai,
    Gemini,
}

/// Configuration for the MeritSim server
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// URL for the database connection
    pub database_url: String,
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    /// Lifetime of issued access tokens
    pub token_ttl_minutes: i64,
    /// Root folder scanned by the material indexer
    pub materials_path: PathBuf,
    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Request timeout for explanation calls
    pub llm_timeout_seconds: u64,
    /// Percentage a map node must reach before the next one unlocks
    pub unlock_threshold: i32,
    /// Reject simulacro submissions that arrive after the time limit
    pub enforce_time_limits: bool,
    /// Directory for rolling JSON log files; stdout only when unset
    pub log_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("bind_address", &self.bind_address)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("materials_path", &self.materials_path)
            .field("llm_provider", &self.llm_provider)
            .field("openai_model", &self.openai_model)
            .field("gemini_model", &self.gemini_model)
            .field("llm_timeout_seconds", &self.llm_timeout_seconds)
            .field("unlock_threshold", &self.unlock_threshold)
            .field("enforce_time_limits", &self.enforce_time_limits)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Update structure for Config with all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub bind_address: Option<String>,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub token_ttl_minutes: Option<i64>,
    #[serde(default)]
    pub materials_path: Option<PathBuf>,
    #[serde(default)]
    pub llm_provider: Option<LlmProvider>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub openai_model: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub gemini_model: Option<String>,
    #[serde(default)]
    pub llm_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub unlock_threshold: Option<i32>,
    #[serde(default)]
    pub enforce_time_limits: Option<bool>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Command line arguments for the server
#[derive(Parser, Debug, Default)]
#[clap(name = "meritsim", about = "Exam preparation backend for civil-service entrance tests")]
pub struct CliArgs {
    /// Database URL
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[clap(long, env = "MERITSIM_BIND")]
    pub bind_address: Option<String>,

    /// Secret used to sign access tokens
    #[clap(long, env = "SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in minutes
    #[clap(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES")]
    pub token_ttl_minutes: Option<i64>,

    /// Folder holding study materials
    #[clap(long, env = "MATERIALS_PATH")]
    pub materials_path: Option<PathBuf>,

    /// Explanation backend
    #[clap(long, env = "MERITSIM_LLM_PROVIDER", value_enum)]
    pub llm_provider: Option<LlmProvider>,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[clap(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[clap(long, env = "GEMINI_MODEL")]
    pub gemini_model: Option<String>,

    /// Timeout for explanation requests in seconds
    #[clap(long, env = "MERITSIM_LLM_TIMEOUT")]
    pub llm_timeout_seconds: Option<u64>,

    /// Progress percentage that unlocks the next adventure map node
    #[clap(long, env = "MERITSIM_UNLOCK_THRESHOLD")]
    pub unlock_threshold: Option<i32>,

    /// Reject late simulacro submissions
    #[clap(long, env = "MERITSIM_ENFORCE_TIME_LIMITS")]
    pub enforce_time_limits: Option<bool>,

    /// Write JSON logs to this directory
    #[clap(long, env = "MERITSIM_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Debug mode
    #[clap(long, env = "MERITSIM_DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl Config {
    /// Applies a config update to the current configuration
    pub fn apply_update(self, update: ConfigUpdate) -> Self {
        Self {
            database_url: update.database_url.unwrap_or(self.database_url),
            bind_address: update.bind_address.unwrap_or(self.bind_address),
            jwt_secret: update.jwt_secret.unwrap_or(self.jwt_secret),
            token_ttl_minutes: update.token_ttl_minutes.unwrap_or(self.token_ttl_minutes),
            materials_path: update.materials_path.unwrap_or(self.materials_path),
            llm_provider: update.llm_provider.unwrap_or(self.llm_provider),
            openai_api_key: update.openai_api_key.or(self.openai_api_key),
            openai_model: update.openai_model.unwrap_or(self.openai_model),
            gemini_api_key: update.gemini_api_key.or(self.gemini_api_key),
            gemini_model: update.gemini_model.unwrap_or(self.gemini_model),
            llm_timeout_seconds: update.llm_timeout_seconds.unwrap_or(self.llm_timeout_seconds),
            unlock_threshold: update.unlock_threshold.unwrap_or(self.unlock_threshold),
            enforce_time_limits: update.enforce_time_limits.unwrap_or(self.enforce_time_limits),
            log_dir: update.log_dir.or(self.log_dir),
        }
    }

    /// Returns the explanation request timeout as a Duration
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    /// Whether the token secret is still the built-in placeholder
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Returns the base (default) configuration
///
/// The database lives in `data_dir` when one is given, otherwise in the
/// working directory.
pub fn base_config(data_dir: Option<PathBuf>) -> Config {
    let database_url = data_dir.map_or("meritsim.db".to_string(), |path| {
        path.join("meritsim.db").to_string_lossy().to_string()
    });

    Config {
        database_url,
        bind_address: "127.0.0.1:3000".to_string(),
        jwt_secret: DEFAULT_JWT_SECRET.to_string(),
        token_ttl_minutes: 30,
        materials_path: PathBuf::from("materials"),
        llm_provider: LlmProvider::None,
        openai_api_key: None,
        openai_model: "gpt-4o-mini".to_string(),
        gemini_api_key: None,
        gemini_model: "gemini-1.5-flash".to_string(),
        llm_timeout_seconds: 30,
        unlock_threshold: crate::progression::DEFAULT_UNLOCK_THRESHOLD,
        enforce_time_limits: false,
        log_dir: None,
    }
}

/// Loads configuration from a TOML file
pub fn config_from_file(config_path: Option<PathBuf>) -> Result<ConfigUpdate, String> {
    let Some(config_path) = config_path else {
        return Ok(ConfigUpdate::default());
    };

    if !config_path.exists() {
        info!("Config file not found at {:?}, using defaults", config_path);
        return Ok(ConfigUpdate::default());
    }

    match fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str::<ConfigUpdate>(&content) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                Ok(config)
            },
            Err(e) => {
                warn!("Failed to parse config file: {}", e);
                Err(format!("Failed to parse config file: {}", e))
            }
        },
        Err(e) => {
            warn!("Failed to read config file: {}", e);
            Err(format!("Failed to read config file: {}", e))
        }
    }
}

/// Loads configuration from command line arguments
pub fn config_from_args(args: CliArgs) -> ConfigUpdate {
    ConfigUpdate {
        database_url: args.database_url,
        bind_address: args.bind_address,
        jwt_secret: args.jwt_secret,
        token_ttl_minutes: args.token_ttl_minutes,
        materials_path: args.materials_path,
        llm_provider: args.llm_provider,
        openai_api_key: args.openai_api_key,
        openai_model: args.openai_model,
        gemini_api_key: args.gemini_api_key,
        gemini_model: args.gemini_model,
        llm_timeout_seconds: args.llm_timeout_seconds,
        unlock_threshold: args.unlock_threshold,
        enforce_time_limits: args.enforce_time_limits,
        log_dir: args.log_dir,
    }
}

/// Gets the complete configuration by combining defaults with
/// values from config file, environment variables, and command line arguments
/// in order of increasing precedence
pub fn get_config(args: CliArgs) -> Config {
    let dirs = ProjectDirs::from("co", "meritsim", "meritsim");
    if dirs.is_none() {
        warn!("Could not determine platform directories, skipping config file");
    }

    let data_dir = dirs
        .as_ref()
        .map(|d| d.data_dir().to_path_buf())
        .filter(|path| path.exists());
    let config_file = dirs.as_ref().map(|d| d.config_dir().join("config.toml"));

    let file_update = config_from_file(config_file).unwrap_or_default();

    let config = base_config(data_dir)
        .apply_update(file_update)
        .apply_update(config_from_args(args));

    info!(
        database_url = %config.database_url,
        bind_address = %config.bind_address,
        llm_provider = ?config.llm_provider,
        unlock_threshold = config.unlock_threshold,
        enforce_time_limits = config.enforce_time_limits,
        "Final configuration"
    );
    if config.uses_default_secret() {
        warn!("SECRET_KEY is not set; access tokens are signed with the default secret");
    }

    config
}


#[cfg(test)]
mod prop_tests;
