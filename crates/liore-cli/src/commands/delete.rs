use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::SyncStore;

use crate::commands::common::resolve_owner;
use crate::error::CliError;

pub async fn run_delete<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    id: &str,
) -> Result<(), CliError> {
    let id = resolve_owner(store, id).await?;

    let confirmed = store.delete_one(&id).await;
    println!("{id}");
    if confirmed {
        Ok(())
    } else {
        Err(CliError::NotSynced("deletion"))
    }
}
