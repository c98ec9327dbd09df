//! Helpers that keep a record set unique by id.

use std::collections::HashMap;

use super::{Owner, OwnerId};

/// Collapse duplicate ids: the last occurrence wins, at the first one's position.
pub fn dedupe_by_id(records: Vec<Owner>) -> Vec<Owner> {
    let mut positions: HashMap<OwnerId, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<Owner> = Vec::with_capacity(records.len());

    for record in records {
        if let Some(&index) = positions.get(&record.id) {
            unique[index] = record;
        } else {
            positions.insert(record.id.clone(), unique.len());
            unique.push(record);
        }
    }

    unique
}

/// Make a caller-supplied set safe to store: blank ids get a generated one,
/// missing dates are stamped with `today`, and duplicate ids are collapsed.
pub fn normalize_record_set(records: Vec<Owner>, today: &str) -> Vec<Owner> {
    let records = records
        .into_iter()
        .map(|mut record| {
            if record.id.is_blank() {
                record.id = OwnerId::generate();
            }
            if record.date_added.trim().is_empty() {
                record.date_added = today.to_string();
            }
            if record.last_updated.trim().is_empty() {
                record.last_updated.clone_from(&record.date_added);
            }
            record
        })
        .collect();
    dedupe_by_id(records)
}

/// Replace the record with the same id, or append it.
pub fn upsert_record(records: &mut Vec<Owner>, owner: Owner) {
    if let Some(existing) = records.iter_mut().find(|record| record.id == owner.id) {
        *existing = owner;
    } else {
        records.push(owner);
    }
}

/// Remove every record with `id`. Returns whether anything was removed.
pub fn remove_record(records: &mut Vec<Owner>, id: &OwnerId) -> bool {
    let before = records.len();
    records.retain(|record| &record.id != id);
    records.len() != before
}
