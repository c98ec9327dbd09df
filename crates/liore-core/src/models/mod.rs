//! Data models for Liore Sync

mod owner;
mod record_set;

pub use owner::{Owner, OwnerDraft, OwnerId, RESERVED_FIELDS};
pub use record_set::{dedupe_by_id, normalize_record_set, remove_record, upsert_record};
