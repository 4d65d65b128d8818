//! Application settings loaded from environment variables
//!
//! Mirrors the original service's `pydantic-settings` approach (one struct,
//! validated once at startup so the process fails fast) translated into the
//! plain env-var + typed-constructor idiom the rest of this crate uses.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("exactly one of NOTESOURCE_DATABASE_ID or NOTESOURCE_PARENT_PAGE_ID must be set, but both were")]
    BothFetchTargetsSet,

    #[error("exactly one of NOTESOURCE_DATABASE_ID or NOTESOURCE_PARENT_PAGE_ID must be set, but neither was")]
    NeitherFetchTargetSet,
}

/// Which note-source fetch mode is configured (spec.md §4.3).
#[derive(Debug, Clone)]
pub enum FetchTarget {
    Database { database_id: String },
    ParentPage { parent_page_id: String },
}

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub notesource_api_token: String,
    pub fetch_target: FetchTarget,
    pub store_path: PathBuf,
    pub embedding_provider_key: String,
    pub chat_provider_key: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub validate_rpcs_on_startup: bool,
}

impl Settings {
    /// Load settings from the process environment, failing fast on any
    /// missing required field or on the fetch-target validator.
    pub fn from_env() -> Result<Self, ConfigError> {
        let notesource_api_token = require_env("NOTESOURCE_API_TOKEN")?;
        let database_id = std::env::var("NOTESOURCE_DATABASE_ID").ok();
        let parent_page_id = std::env::var("NOTESOURCE_PARENT_PAGE_ID").ok();
        let fetch_target = match (database_id, parent_page_id) {
            (Some(_), Some(_)) => return Err(ConfigError::BothFetchTargetsSet),
            (None, None) => return Err(ConfigError::NeitherFetchTargetSet),
            (Some(database_id), None) => FetchTarget::Database { database_id },
            (None, Some(parent_page_id)) => FetchTarget::ParentPage { parent_page_id },
        };

        let store_path = PathBuf::from(require_env("STORE_PATH")?);
        let embedding_provider_key = require_env("EMBEDDING_PROVIDER_KEY")?;
        let chat_provider_key = require_env("CHAT_PROVIDER_KEY")?;

        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: raw,
            })?,
            Err(_) => 8000,
        };
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let validate_rpcs_on_startup = std::env::var("VALIDATE_RPCS_ON_STARTUP")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            notesource_api_token,
            fetch_target,
            store_path,
            embedding_provider_key,
            chat_provider_key,
            environment,
            host,
            port,
            cors_origins,
            validate_rpcs_on_startup,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingRequired(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "NOTESOURCE_API_TOKEN",
            "NOTESOURCE_DATABASE_ID",
            "NOTESOURCE_PARENT_PAGE_ID",
            "STORE_PATH",
            "EMBEDDING_PROVIDER_KEY",
            "CHAT_PROVIDER_KEY",
            "PORT",
            "CORS_ORIGINS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn rejects_both_fetch_targets() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("NOTESOURCE_API_TOKEN", "tok");
        std::env::set_var("NOTESOURCE_DATABASE_ID", "db1");
        std::env::set_var("NOTESOURCE_PARENT_PAGE_ID", "page1");
        std::env::set_var("STORE_PATH", "/tmp/x.db");
        std::env::set_var("EMBEDDING_PROVIDER_KEY", "k");
        std::env::set_var("CHAT_PROVIDER_KEY", "k");

        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::BothFetchTargetsSet));
        clear_env();
    }

    #[test]
    fn rejects_neither_fetch_target() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("NOTESOURCE_API_TOKEN", "tok");
        std::env::set_var("STORE_PATH", "/tmp/x.db");
        std::env::set_var("EMBEDDING_PROVIDER_KEY", "k");
        std::env::set_var("CHAT_PROVIDER_KEY", "k");

        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::NeitherFetchTargetSet));
        clear_env();
    }

    #[test]
    fn loads_valid_settings_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("NOTESOURCE_API_TOKEN", "tok");
        std::env::set_var("NOTESOURCE_DATABASE_ID", "db1");
        std::env::set_var("STORE_PATH", "/tmp/x.db");
        std::env::set_var("EMBEDDING_PROVIDER_KEY", "k");
        std::env::set_var("CHAT_PROVIDER_KEY", "k");

        let settings = Settings::from_env().expect("should load");
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.environment, "development");
        assert!(matches!(settings.fetch_target, FetchTarget::Database { .. }));
        clear_env();
    }
}
