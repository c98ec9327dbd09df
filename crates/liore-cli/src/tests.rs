use std::sync::Arc;

use chrono::NaiveDate;
use liore_core::cache::MemoryCache;
use liore_core::config::StoreConfig;
use liore_core::notify::{Severity, SilentNotifier};
use liore_core::remote::MemoryRemote;
use liore_core::{ConnectionStatus, Owner, OwnerId, SyncStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use tempfile::tempdir;

use crate::commands::add::run_add;
use crate::commands::clear::run_clear;
use crate::commands::common::{
    format_owner_lines, name_preview, normalize_owner_identifier, normalize_owner_name,
    parse_field, parse_fields, render_extra_fields, resolve_owner_id,
};
use crate::commands::config::{redacted_config, run_config_init, ConfigUpdates};
use crate::commands::delete::run_delete;
use crate::commands::export::resolve_export_path;
use crate::commands::import::run_import;
use crate::commands::status::format_status;
use crate::commands::update::run_update;
use crate::error::CliError;
use crate::notifier::format_notification;

fn owner(id: &str, name: &str) -> Owner {
    Owner {
        id: OwnerId::from(id),
        owner_name: name.to_string(),
        date_added: "2025-01-01".to_string(),
        last_updated: "2025-01-02".to_string(),
        extra: Map::new(),
    }
}

fn memory_store(remote: &MemoryRemote) -> SyncStore<MemoryRemote, MemoryCache> {
    SyncStore::new(remote.clone(), MemoryCache::new()).with_notifier(Arc::new(SilentNotifier))
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[test]
fn parse_field_reads_json_values_and_falls_back_to_text() {
    assert_eq!(parse_field("rank=3").unwrap(), ("rank".to_string(), json!(3)));
    assert_eq!(
        parse_field("active=true").unwrap(),
        ("active".to_string(), json!(true))
    );
    assert_eq!(
        parse_field("story=Moonrise over Liore").unwrap(),
        ("story".to_string(), json!("Moonrise over Liore"))
    );
    assert_eq!(
        parse_field("note=a=b").unwrap(),
        ("note".to_string(), json!("a=b"))
    );
}

#[test]
fn parse_field_rejects_missing_key_or_separator() {
    assert!(matches!(parse_field("rank"), Err(CliError::InvalidField(_))));
    assert!(matches!(parse_field("=3"), Err(CliError::InvalidField(_))));
    assert!(matches!(parse_field("id=abc"), Err(CliError::InvalidField(_))));
}

#[test]
fn parse_fields_later_values_win() {
    let fields = parse_fields(&args(&["rank=1", "rank=2"])).unwrap();
    assert_eq!(fields.get("rank"), Some(&json!(2)));
    assert_eq!(fields.len(), 1);
}

#[test]
fn normalize_owner_name_joins_and_rejects_empty() {
    assert_eq!(
        normalize_owner_name(&args(&["Ada", "Lovelace"])).unwrap(),
        "Ada Lovelace"
    );
    assert!(matches!(
        normalize_owner_name(&args(&["  "])),
        Err(CliError::EmptyOwnerName)
    ));
}

#[test]
fn normalize_owner_identifier_rejects_empty() {
    assert!(matches!(
        normalize_owner_identifier(" \n "),
        Err(CliError::EmptyOwnerId)
    ));
    assert_eq!(normalize_owner_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn resolve_owner_id_supports_exact_and_prefix_match() {
    let owners = vec![owner("abc111", "Ada"), owner("abc222", "Bo"), owner("abc", "Cy")];

    assert_eq!(resolve_owner_id("abc", &owners).unwrap(), OwnerId::from("abc"));
    assert_eq!(
        resolve_owner_id("abc2", &owners).unwrap(),
        OwnerId::from("abc222")
    );
    assert!(matches!(
        resolve_owner_id("abc1x", &owners),
        Err(CliError::OwnerNotFound(_))
    ));
}

#[test]
fn resolve_owner_id_reports_ambiguous_prefix() {
    let owners = vec![owner("abc111", "Ada"), owner("abc222", "Bo")];

    let error = resolve_owner_id("ab", &owners).unwrap_err();

    let CliError::AmbiguousOwnerId(message) = error else {
        panic!("expected ambiguity error");
    };
    assert!(message.contains("abc111"));
    assert!(message.contains("abc222"));
}

#[test]
fn name_preview_truncates_with_ellipsis() {
    assert_eq!(name_preview("Ada   Lovelace", 40), "Ada Lovelace");
    assert_eq!(
        name_preview("A very long owner name that keeps going", 20),
        "A very long owner..."
    );
}

#[test]
fn format_owner_lines_include_dates_and_extra_fields() {
    let owners = vec![
        owner("0192aaaabbbbccccdddd", "Ada"),
        owner("b", "Bo").with_field("rank", 2).with_field("story", "Moonrise"),
    ];

    let lines = format_owner_lines(&owners);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("0192aaaabbbb  Ada"));
    assert!(lines[0].ends_with("2025-01-01  2025-01-02"));
    assert!(lines[1].ends_with("rank=2 story=Moonrise"));
    assert_eq!(render_extra_fields(&owners[0]), "");
}

#[test]
fn notifications_are_labelled_by_severity() {
    assert_eq!(
        format_notification("Changes saved!", Severity::Success),
        "[ok] Changes saved!"
    );
    assert_eq!(
        format_notification("Working offline", Severity::Warning),
        "[warn] Working offline"
    );
}

#[test]
fn format_status_mentions_error_when_offline() {
    let status = ConnectionStatus {
        connected: false,
        message: "No internet connection".to_string(),
        error: Some("timeout".to_string()),
    };
    assert_eq!(
        format_status(&status),
        "offline: No internet connection (timeout)"
    );
}

#[test]
fn config_init_merges_into_existing_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");

    run_config_init(
        &path,
        ConfigUpdates {
            project_id: Some("liore-verse".to_string()),
            api_key: Some("key-123".to_string()),
            ..ConfigUpdates::default()
        },
    )
    .unwrap();
    let config = run_config_init(
        &path,
        ConfigUpdates {
            collection: Some("owners".to_string()),
            ..ConfigUpdates::default()
        },
    )
    .unwrap();

    assert_eq!(config.firebase.project_id.as_deref(), Some("liore-verse"));
    assert_eq!(config.firebase.api_key.as_deref(), Some("key-123"));
    assert_eq!(config.collection, "owners");
    assert_eq!(StoreConfig::load_from_path(&path).unwrap(), config);
}

#[test]
fn config_init_rejects_non_http_base_url() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("config.json");

    let result = run_config_init(
        &path,
        ConfigUpdates {
            base_url: Some("localhost:8080".to_string()),
            ..ConfigUpdates::default()
        },
    );

    assert!(matches!(result, Err(CliError::Config(_))));
    assert!(!path.exists());
}

#[test]
fn redacted_config_hides_credentials() {
    let mut config = StoreConfig::default();
    config.firebase.api_key = Some("secret-key".to_string());
    config.firebase.project_id = Some("liore-verse".to_string());

    let value = redacted_config(&config).unwrap();

    assert_eq!(value["firebase"]["api_key"], json!("[REDACTED]"));
    assert_eq!(value["firebase"]["project_id"], json!("liore-verse"));
    assert!(value["firebase"].get("auth_token").is_none());
}

#[test]
fn export_into_directory_uses_dated_file_name() {
    let tmp = tempdir().unwrap();
    let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

    assert_eq!(
        resolve_export_path(tmp.path(), today),
        tmp.path().join("liore-story-owners-backup-2025-03-01.json")
    );
    let file = tmp.path().join("owners.json");
    assert_eq!(resolve_export_path(&file, today), file);
}

#[tokio::test(flavor = "current_thread")]
async fn add_then_update_by_prefix() {
    let remote = MemoryRemote::new();
    let store = memory_store(&remote);

    let id = run_add(&store, &args(&["Ada"]), &args(&["story=Moonrise"]))
        .await
        .unwrap();
    let prefix = &id.as_str()[..8];
    let updated = run_update(&store, prefix, Some("Ada Lovelace"), &args(&["rank=1"]))
        .await
        .unwrap();

    assert_eq!(updated, id);
    let owners = store.records().await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].owner_name, "Ada Lovelace");
    assert_eq!(owners[0].extra.get("story"), Some(&json!("Moonrise")));
    assert_eq!(owners[0].extra.get("rank"), Some(&json!(1)));
    assert_eq!(remote.keys(), vec![id.to_string()]);
}

#[tokio::test(flavor = "current_thread")]
async fn update_without_changes_is_rejected() {
    let store = memory_store(&MemoryRemote::new());

    let result = run_update(&store, "abc", None, &[]).await;

    assert!(matches!(result, Err(CliError::NothingToUpdate)));
}

#[tokio::test(flavor = "current_thread")]
async fn delete_reports_local_only_removal() {
    let remote = MemoryRemote::new();
    let store = memory_store(&remote);
    assert!(store.save_all(vec![owner("abc111", "Ada")]).await);

    remote.set_unreachable(true);
    let result = run_delete(&store, "abc").await;

    assert!(matches!(result, Err(CliError::NotSynced(_))));
    assert_eq!(store.records().await, Some(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn clear_requires_confirmation() {
    let remote = MemoryRemote::new();
    let store = memory_store(&remote);
    assert!(store.save_all(vec![owner("a", "Ada")]).await);

    assert!(matches!(
        run_clear(&store, false).await,
        Err(CliError::ConfirmationRequired)
    ));
    assert_eq!(remote.keys(), vec!["a".to_string()]);

    run_clear(&store, true).await.unwrap();
    assert!(remote.keys().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn import_rejects_malformed_backup() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("backup.json");
    std::fs::write(&path, r#"{"owners": []}"#).unwrap();
    let remote = MemoryRemote::new();
    let store = memory_store(&remote);

    let result = run_import(&store, &path).await;

    assert!(matches!(
        result,
        Err(CliError::Core(liore_core::Error::Format(_)))
    ));
    assert_eq!(remote.commit_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn import_replaces_remote_owners() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("backup.json");
    std::fs::write(
        &path,
        serde_json::to_string(&vec![owner("a", "Ada"), owner("b", "Bo")]).unwrap(),
    )
    .unwrap();
    let remote = MemoryRemote::new();
    let store = memory_store(&remote);
    assert!(store.save_all(vec![owner("old", "Old")]).await);

    run_import(&store, &path).await.unwrap();

    assert_eq!(remote.keys(), vec!["a".to_string(), "b".to_string()]);
}
