use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use liore_core::cache::LocalCache;
use liore_core::export::suggested_export_file_name;
use liore_core::remote::RemoteStore;
use liore_core::SyncStore;

use crate::error::CliError;

pub async fn run_export<R: RemoteStore, C: LocalCache>(
    store: &SyncStore<R, C>,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let rendered = store.export_json().await?;

    if let Some(path) = output_path {
        let path = resolve_export_path(path, chrono::Local::now().date_naive());
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// A directory target gets the dated backup file name appended.
pub fn resolve_export_path(path: &Path, today: NaiveDate) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(today))
    } else {
        path.to_path_buf()
    }
}
