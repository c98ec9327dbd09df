use chrono::Local;
use liore_core::cache::LocalCache;
use liore_core::remote::RemoteStore;
use liore_core::{Owner, SyncStore};

use crate::commands::common::format_owner_lines;
use crate::error::CliError;

/// Print the current owners, then every live snapshot until Ctrl-C.
pub async fn run_watch<R, C>(store: &SyncStore<R, C>, as_json: bool) -> Result<(), CliError>
where
    R: RemoteStore,
    C: LocalCache + Send + Sync + 'static,
{
    let owners = store.load().await;
    print_snapshot(&owners, as_json)?;

    let mut subscription = store.subscribe().await?;
    if !as_json {
        eprintln!("Watching for changes, press Ctrl-C to stop.");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = subscription.next() => match event {
                Some(Ok(owners)) => print_snapshot(&owners, as_json)?,
                Some(Err(error)) => tracing::warn!("{error}"),
                None => break,
            },
        }
    }

    subscription.cancel();
    Ok(())
}

fn print_snapshot(owners: &[Owner], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string(owners)?);
        return Ok(());
    }

    println!(
        "--- {} ({} owners)",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        owners.len()
    );
    for line in format_owner_lines(owners) {
        println!("{line}");
    }
    Ok(())
}
