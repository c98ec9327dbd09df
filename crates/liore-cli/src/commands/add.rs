use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::{OwnerDraft, OwnerId, SyncStore};

use crate::commands::common::{normalize_owner_name, parse_fields};
use crate::error::CliError;

pub async fn run_add<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    name_parts: &[String],
    raw_fields: &[String],
) -> Result<OwnerId, CliError> {
    let name = normalize_owner_name(name_parts)?;
    let draft = OwnerDraft {
        id: None,
        owner_name: Some(name),
        fields: parse_fields(raw_fields)?,
    };

    let id = store.save_one(draft).await?;
    println!("{id}");
    Ok(id)
}
