//! Application configuration
//!
//! Loaded once from a TOML file with environment variable overrides and kept
//! in a process-wide `OnceLock`.

use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub features: FeaturesConfig,
    pub deletion: DeletionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage backend: sqlite, mysql, postgres, mariadb, file, memory
    pub backend: String,
    /// Connection URL for the relational backends
    pub database_url: String,
    /// Record log path for the file backend
    pub file_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            backend: "sqlite".to_string(),
            database_url: "sqlite://linkvault.db?mode=rwc".to_string(),
            file_path: "links.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Upper bound on code-generation retries before giving up
    pub max_code_attempts: usize,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        FeaturesConfig {
            max_code_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionConfig {
    /// Codes per soft-delete batch
    pub batch_size: usize,
    /// Fixed worker count for the deletion pipeline
    pub workers: usize,
    /// Retry bound per batch before it is recorded as failed
    pub max_retries: usize,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        DeletionConfig {
            batch_size: 64,
            workers: 4,
            max_retries: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file with environment variable fallback
    pub fn load() -> Self {
        let mut config = Self::load_from_file();
        config.override_with_env();
        config
    }

    /// Load configuration from TOML file
    fn load_from_file() -> Self {
        let config_paths = [
            "config.toml",
            "linkvault.toml",
            "config/config.toml",
            "/etc/linkvault/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                debug!("Loading config from: {}", path);
                match fs::read_to_string(path) {
                    Ok(content) => match toml::from_str::<AppConfig>(&content) {
                        Ok(config) => {
                            debug!("Successfully loaded config from: {}", path);
                            return config;
                        }
                        Err(e) => {
                            warn!("Failed to parse config file {}: {}", path, e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read config file {}: {}", path, e);
                    }
                }
            }
        }

        debug!("No config file found, using defaults");
        Self::default()
    }

    /// Override configuration with environment variables
    fn override_with_env(&mut self) {
        if let Ok(backend) = env::var("DATABASE_BACKEND") {
            self.database.backend = backend;
        }
        if let Ok(database_url) = env::var("DATABASE_URL") {
            self.database.database_url = database_url;
        }
        if let Ok(file_path) = env::var("DB_FILE_NAME") {
            self.database.file_path = file_path;
        }
        if let Ok(attempts) = env::var("MAX_CODE_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.features.max_code_attempts = n;
            } else {
                error!("Invalid MAX_CODE_ATTEMPTS: {}", attempts);
            }
        }
        if let Ok(batch_size) = env::var("DELETION_BATCH_SIZE") {
            if let Ok(n) = batch_size.parse() {
                self.deletion.batch_size = n;
            } else {
                error!("Invalid DELETION_BATCH_SIZE: {}", batch_size);
            }
        }
        if let Ok(workers) = env::var("DELETION_WORKERS") {
            if let Ok(n) = workers.parse() {
                self.deletion.workers = n;
            } else {
                error!("Invalid DELETION_WORKERS: {}", workers);
            }
        }
        if let Ok(retries) = env::var("DELETION_MAX_RETRIES") {
            if let Ok(n) = retries.parse() {
                self.deletion.max_retries = n;
            } else {
                error!("Invalid DELETION_MAX_RETRIES: {}", retries);
            }
        }
    }
}

/// Initialize the global configuration. Later calls are no-ops.
pub fn init_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}

/// Get the global configuration, loading it on first use.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::load)
}
