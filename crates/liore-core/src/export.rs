//! Backup export and import helpers.

use chrono::NaiveDate;
use serde_json::Value;

use crate::clock::DATE_FORMAT;
use crate::models::Owner;
use crate::{Error, Result};

/// Render owners as pretty-printed JSON.
pub fn render_json_export(owners: &[Owner]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(owners)
}

/// Build the default backup file name for `date`.
#[must_use]
pub fn suggested_export_file_name(date: NaiveDate) -> String {
    format!(
        "liore-story-owners-backup-{}.json",
        date.format(DATE_FORMAT)
    )
}

/// Parse a backup file into owners.
///
/// The payload must be a JSON array whose entries are owner objects;
/// anything else is a [`Error::Format`]. Ids and dates are not filled in
/// here.
pub fn parse_import(raw: &str) -> Result<Vec<Owner>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|error| Error::Format(format!("backup is not valid JSON: {error}")))?;

    let Value::Array(items) = value else {
        return Err(Error::Format(
            "backup must be a JSON array of owners".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(Error::Format(format!("entry {index} is not an object")));
            }
            serde_json::from_value::<Owner>(item)
                .map_err(|error| Error::Format(format!("entry {index} is not an owner: {error}")))
        })
        .collect()
}
