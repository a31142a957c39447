use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use healthlens_core::db::Database;
use healthlens_core::llm::DEFAULT_MODEL;

/// Setting the API key is stored under when set with `healthlens key set`.
pub const API_KEY_SETTING: &str = "openai_api_key";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const MODEL_ENV: &str = "HEALTHLENS_MODEL";

pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "healthlens").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("healthlens.db");
        tracing::debug!(path = %db_path.display(), "using database");

        Ok(Config { db_path })
    }

    /// Completion model, from `HEALTHLENS_MODEL` when set.
    pub fn model() -> String {
        resolve_model(std::env::var(MODEL_ENV).ok())
    }

    /// API key from `OPENAI_API_KEY`, falling back to the stored setting.
    pub fn api_key(db: &Database) -> Result<Option<String>> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), db)
    }
}

fn resolve_model(env: Option<String>) -> String {
    env.map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn resolve_api_key(env: Option<String>, db: &Database) -> Result<Option<String>> {
    let non_empty = |k: String| Some(k.trim().to_string()).filter(|k| !k.is_empty());
    if let Some(key) = env.and_then(non_empty) {
        return Ok(Some(key));
    }
    Ok(db.get_setting(API_KEY_SETTING)?.and_then(non_empty))
}
