use std::path::Path;

use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::SyncStore;

use crate::error::CliError;

pub async fn run_import<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    path: &Path,
) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(path)?;

    if store.import_json(&raw).await? {
        Ok(())
    } else {
        Err(CliError::NotSynced("import"))
    }
}
