use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::{ConnectionStatus, SyncStore};

use crate::error::CliError;

pub async fn run_status<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    as_json: bool,
) -> Result<ConnectionStatus, CliError> {
    let status = store.connection_status().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", format_status(&status));
    }

    Ok(status)
}

pub fn format_status(status: &ConnectionStatus) -> String {
    let state = if status.connected {
        "connected"
    } else {
        "offline"
    };
    match &status.error {
        Some(error) => format!("{state}: {} ({error})", status.message),
        None => format!("{state}: {}", status.message),
    }
}
