use std::env;
use std::path::{Path, PathBuf};

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    /// Separate key for grounded web search. Falls back to GEMINI_API_KEY.
    pub const GEMINI_SEARCH_API_KEY: &str = "GEMINI_SEARCH_API_KEY";
    pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
    pub const HOST: &str = "HOST";
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Root for uploaded documents and note files (default: assistant-backend/data)
    pub const DATA_DIR: &str = "DATA_DIR";
}

/// Default values
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8000;
    pub const DATABASE_URL: &str = "./.db/assistant.db";
    pub const DATA_DIR: &str = "data";
    pub const DOCUMENTS_DIR: &str = "documents";
    pub const NOTES_DIR: &str = "user_notes";
    pub const CONFIG_DIR: &str = "config";
}

/// Returns the absolute path to the assistant-backend directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// to assistant-backend/ regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Get the data directory (DATA_DIR override, else assistant-backend/data)
pub fn data_dir() -> PathBuf {
    match env::var(env_vars::DATA_DIR) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => backend_dir().join(defaults::DATA_DIR),
    }
}

/// Uploaded documents land here before ingestion
pub fn documents_dir() -> PathBuf {
    data_dir().join(defaults::DOCUMENTS_DIR)
}

pub fn notes_dir() -> PathBuf {
    data_dir().join(defaults::NOTES_DIR)
}

/// Get the assistant config directory (inside assistant-backend)
pub fn assistant_config_dir() -> PathBuf {
    backend_dir().join(defaults::CONFIG_DIR)
}

/// Get the runtime assistant_config.ron path
pub fn assistant_config_path() -> PathBuf {
    assistant_config_dir().join("assistant_config.ron")
}

/// Read an env var, treating empty strings as unset
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_search_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub host: String,
    pub port: u16,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = match env::var(env_vars::PORT) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("PORT '{}' is not a valid number, using {}", raw, defaults::PORT);
                defaults::PORT
            }),
            Err(_) => defaults::PORT,
        };

        Self {
            gemini_api_key: non_empty_var(env_vars::GEMINI_API_KEY),
            gemini_search_api_key: non_empty_var(env_vars::GEMINI_SEARCH_API_KEY),
            tavily_api_key: non_empty_var(env_vars::TAVILY_API_KEY),
            host: non_empty_var(env_vars::HOST).unwrap_or_else(|| defaults::HOST.to_string()),
            port,
            database_url: non_empty_var(env_vars::DATABASE_URL)
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
        }
    }

    /// Key used by grounded web search: the dedicated search key, else the main key
    pub fn search_api_key(&self) -> Option<String> {
        self.gemini_search_api_key
            .clone()
            .or_else(|| self.gemini_api_key.clone())
    }
}

/// Create the data, documents, notes, database and config directories.
/// This should be called at startup before any request is served.
pub fn initialize_workspace(config: &Config) -> std::io::Result<()> {
    let data = data_dir();
    std::fs::create_dir_all(&data)?;
    log::info!("Data directory: {:?}", data);

    std::fs::create_dir_all(documents_dir())?;
    std::fs::create_dir_all(notes_dir())?;

    if let Some(parent) = Path::new(&config.database_url).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let cfg_dir = assistant_config_dir();
    std::fs::create_dir_all(&cfg_dir)?;

    let cfg_path = assistant_config_path();
    if !cfg_path.exists() {
        log::info!("No assistant_config.ron at {:?}, writing defaults", cfg_path);
        if let Err(e) = crate::models::AssistantConfig::default().save() {
            log::warn!("Could not write default assistant_config.ron: {}", e);
        }
    } else {
        log::info!("Using existing assistant_config.ron at {:?}", cfg_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_falls_back_to_main_key() {
        let config = Config {
            gemini_api_key: Some("main".to_string()),
            gemini_search_api_key: None,
            tavily_api_key: None,
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            database_url: defaults::DATABASE_URL.to_string(),
        };
        assert_eq!(config.search_api_key().as_deref(), Some("main"));

        let config = Config {
            gemini_search_api_key: Some("search".to_string()),
            ..config
        };
        assert_eq!(config.search_api_key().as_deref(), Some("search"));
    }

    #[test]
    fn test_notes_and_documents_live_under_data_dir() {
        assert!(notes_dir().starts_with(data_dir()));
        assert!(documents_dir().starts_with(data_dir()));
        assert!(notes_dir().ends_with("user_notes"));
    }
}
