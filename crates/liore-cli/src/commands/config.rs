use std::path::Path;

use liore_core::config::StoreConfig;
use liore_core::util::{is_http_url, normalize_text_option};
use serde_json::Value;

use crate::cli::ConfigCommands;
use crate::error::CliError;

const REDACTED: &str = "[REDACTED]";

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            project_id,
            api_key,
            database_id,
            base_url,
            collection,
        } => {
            let updates = ConfigUpdates {
                project_id,
                api_key,
                database_id,
                base_url,
                collection,
            };
            run_config_init(config_path, updates)?;
            println!("{}", config_path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let mut config = StoreConfig::load_from_path(config_path)?;
            config.apply_env();
            println!("{}", serde_json::to_string_pretty(&redacted_config(&config)?)?);
            Ok(())
        }
    }
}

/// Values passed to `config init`; absent ones keep what the file holds.
#[derive(Debug, Default)]
pub struct ConfigUpdates {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub base_url: Option<String>,
    pub collection: Option<String>,
}

pub fn run_config_init(path: &Path, updates: ConfigUpdates) -> Result<StoreConfig, CliError> {
    let mut config = StoreConfig::load_from_path(path)?;

    if let Some(base_url) = normalize_text_option(updates.base_url) {
        if !is_http_url(&base_url) {
            return Err(CliError::Config(format!(
                "base URL must start with http:// or https://: {base_url}"
            )));
        }
        config.firebase.base_url = Some(base_url);
    }
    if let Some(project_id) = normalize_text_option(updates.project_id) {
        config.firebase.project_id = Some(project_id);
    }
    if let Some(api_key) = normalize_text_option(updates.api_key) {
        config.firebase.api_key = Some(api_key);
    }
    if let Some(database_id) = normalize_text_option(updates.database_id) {
        config.firebase.database_id = Some(database_id);
    }
    if let Some(collection) = normalize_text_option(updates.collection) {
        config.collection = collection;
    }

    config.save_to_path(path)?;
    Ok(config)
}

pub fn redacted_config(config: &StoreConfig) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(config)?;
    if let Some(firebase) = value.get_mut("firebase").and_then(Value::as_object_mut) {
        for key in ["api_key", "auth_token"] {
            if let Some(secret) = firebase.get_mut(key) {
                *secret = Value::String(REDACTED.to_string());
            }
        }
    }
    Ok(value)
}
