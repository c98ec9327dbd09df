use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::{OwnerDraft, OwnerId, SyncStore};

use crate::commands::common::{normalize_owner_name, parse_fields, resolve_owner};
use crate::error::CliError;

pub async fn run_update<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    id: &str,
    name: Option<&str>,
    raw_fields: &[String],
) -> Result<OwnerId, CliError> {
    let owner_name = name
        .map(|name| normalize_owner_name(&[name.to_string()]))
        .transpose()?;
    let fields = parse_fields(raw_fields)?;
    if owner_name.is_none() && fields.is_empty() {
        return Err(CliError::NothingToUpdate);
    }

    let id = resolve_owner(store, id).await?;
    let draft = OwnerDraft {
        id: Some(id),
        owner_name,
        fields,
    };

    let id = store.save_one(draft).await?;
    println!("{id}");
    Ok(id)
}
