use std::path::{Path, PathBuf};
use std::sync::Arc;

use liore_core::cache::{LocalCache, SqliteCache};
use liore_core::config::StoreConfig;
use liore_core::remote::{FirestoreRemote, RemoteStore};
use liore_core::{Owner, OwnerId, SyncStore};
use serde_json::{Map, Value};

use crate::error::CliError;
use crate::notifier::TerminalNotifier;

pub type CliStore = SyncStore<FirestoreRemote, SqliteCache>;

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("liore").join("config.json"))
        .ok_or_else(|| CliError::Config("failed to resolve config directory".to_string()))
}

pub fn default_cache_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("liore").join("cache.db"))
        .ok_or_else(|| CliError::Config("failed to resolve data directory".to_string()))
}

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_path.map_or_else(default_config_path, Ok)
}

pub fn resolve_cache_path(cli_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_path.map_or_else(default_cache_path, Ok)
}

/// Config file overlaid with `LIORE_*` environment variables.
pub fn load_config(path: &Path) -> Result<StoreConfig, CliError> {
    let mut config = StoreConfig::load_from_path(path)?;
    config.apply_env();
    if !config.firebase.is_configured() {
        tracing::warn!(
            "No Firebase project configured; run `liore config init --project-id <ID>` or set LIORE_FIREBASE_PROJECT_ID"
        );
    }
    Ok(config)
}

pub fn open_store(
    config: &StoreConfig,
    cache_path: &Path,
    quiet: bool,
) -> Result<CliStore, CliError> {
    let cache = SqliteCache::open(cache_path)?;
    let remote = FirestoreRemote::new(config.clone());
    Ok(
        SyncStore::with_cache_key(remote, cache, config.cache_key.clone())
            .with_notifier(Arc::new(TerminalNotifier::new(quiet))),
    )
}

pub fn normalize_owner_name(parts: &[String]) -> Result<String, CliError> {
    let name = parts.join(" ");
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::EmptyOwnerName);
    }
    Ok(name.to_string())
}

pub fn normalize_owner_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyOwnerId);
    }
    Ok(trimmed.to_string())
}

/// Parse a `KEY=VALUE` argument. The value is read as JSON when it parses,
/// otherwise kept as a plain string.
pub fn parse_field(raw: &str) -> Result<(String, Value), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidField(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() || key == "id" {
        return Err(CliError::InvalidField(raw.to_string()));
    }
    let value = serde_json::from_str(value.trim())
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn parse_fields(raw: &[String]) -> Result<Map<String, Value>, CliError> {
    raw.iter().map(|field| parse_field(field)).collect()
}

/// Find the owner an id or id prefix refers to.
pub fn resolve_owner_id(query: &str, owners: &[Owner]) -> Result<OwnerId, CliError> {
    if let Some(owner) = owners.iter().find(|owner| owner.id.as_str() == query) {
        return Ok(owner.id.clone());
    }

    let matching = owners
        .iter()
        .filter(|owner| owner.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::OwnerNotFound(query.to_string())),
        [owner] => Ok(owner.id.clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|owner| short_id(&owner.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousOwnerId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Load the current owners and resolve `query` against them.
pub async fn resolve_owner<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    query: &str,
) -> Result<OwnerId, CliError> {
    let query = normalize_owner_identifier(query)?;
    let owners = match store.records().await {
        Some(owners) => owners,
        None => store.load().await,
    };
    resolve_owner_id(&query, &owners)
}

pub fn short_id(id: &OwnerId) -> String {
    id.as_str().chars().take(12).collect()
}

pub fn name_preview(name: &str, max_chars: usize) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_owner_lines(owners: &[Owner]) -> Vec<String> {
    owners
        .iter()
        .map(|owner| {
            let short_id = short_id(&owner.id);
            let name = name_preview(&owner.owner_name, 32);
            let extra = render_extra_fields(owner);

            if extra.is_empty() {
                format!(
                    "{short_id:<12}  {name:<32}  {}  {}",
                    owner.date_added, owner.last_updated
                )
            } else {
                format!(
                    "{short_id:<12}  {name:<32}  {}  {}  {extra}",
                    owner.date_added, owner.last_updated
                )
            }
        })
        .collect()
}

pub fn render_extra_fields(owner: &Owner) -> String {
    owner
        .extra
        .iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
