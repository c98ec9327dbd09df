use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::SyncStore;

use crate::commands::common::format_owner_lines;
use crate::error::CliError;

pub async fn run_list<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    as_json: bool,
) -> Result<(), CliError> {
    let owners = store.load().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&owners)?);
    } else if owners.is_empty() {
        println!("No owners yet.");
    } else {
        for line in format_owner_lines(&owners) {
            println!("{line}");
        }
    }

    Ok(())
}
