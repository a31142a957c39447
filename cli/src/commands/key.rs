use anyhow::{Result, bail};

use healthlens_core::db::Database;

use crate::config::API_KEY_SETTING;

use super::helpers::mask_key;

pub(crate) fn cmd_key_set(db: &Database, key: &str, json: bool) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key cannot be empty");
    }
    db.set_setting(API_KEY_SETTING, key)?;

    if json {
        println!("{}", serde_json::json!({ "key": mask_key(key) }));
    } else {
        println!("Saved API key {}", mask_key(key));
    }

    Ok(())
}

pub(crate) fn cmd_key_clear(db: &Database, json: bool) -> Result<()> {
    let removed = db.delete_setting(API_KEY_SETTING)?;

    if json {
        println!("{}", serde_json::json!({ "cleared": removed }));
    } else if removed {
        println!("Removed stored API key");
    } else {
        eprintln!("No stored API key");
    }

    Ok(())
}
