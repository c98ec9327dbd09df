use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::SyncStore;

use crate::error::CliError;

pub async fn run_clear<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    confirmed: bool,
) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }

    if store.clear_all().await {
        Ok(())
    } else {
        Err(CliError::NotSynced("clear"))
    }
}
