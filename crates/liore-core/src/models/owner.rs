//! Story owner model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fields managed by the sync store rather than by callers.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "date_added", "last_updated"];

/// Identifier of an owner record; also the remote document key.
///
/// Generated ids are UUID v7 (millisecond timestamp followed by random bits)
/// in simple hex form. Ids that arrive from the remote store or an import are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create a new time-ordered random id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty or whitespace-only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OwnerId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A story owner record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// Unique identifier, doubles as the remote document key
    #[serde(default = "OwnerId::generate")]
    pub id: OwnerId,
    /// Display name
    #[serde(default)]
    pub owner_name: String,
    /// ISO date the owner was first stored
    #[serde(default)]
    pub date_added: String,
    /// ISO date of the most recent single-record write
    #[serde(default)]
    pub last_updated: String,
    /// Any other fields the admin page attaches
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Owner {
    /// Create a new owner stamped with `today`
    #[must_use]
    pub fn new(owner_name: impl Into<String>, today: &str) -> Self {
        Self {
            id: OwnerId::generate(),
            owner_name: owner_name.into(),
            date_added: today.to_string(),
            last_updated: today.to_string(),
            extra: Map::new(),
        }
    }

    /// Attach an extra field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Remote payload for this owner: every field except `id`.
    pub fn to_document(&self) -> serde_json::Result<Map<String, Value>> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.remove("id");
        Ok(fields)
    }

    /// Rebuild an owner from a remote document, restoring `id` from its key.
    pub fn from_document(key: &str, mut fields: Map<String, Value>) -> serde_json::Result<Self> {
        fields.insert("id".to_string(), Value::String(key.to_string()));
        serde_json::from_value(Value::Object(fields))
    }

    /// Overlay the fields present in `draft`; absent fields are kept.
    pub fn merge_draft(&mut self, draft: &OwnerDraft) {
        if let Some(name) = &draft.owner_name {
            self.owner_name.clone_from(name);
        }
        for (key, value) in draft.writable_fields() {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

/// A partial owner submitted for a single-record write.
///
/// Without an `id` it describes a new owner; with one it lists the fields to
/// overwrite on an existing owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OwnerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OwnerDraft {
    /// Draft for a brand-new owner
    #[must_use]
    pub fn named(owner_name: impl Into<String>) -> Self {
        Self {
            owner_name: Some(owner_name.into()),
            ..Self::default()
        }
    }

    /// Draft targeting an existing owner
    #[must_use]
    pub fn for_id(id: impl Into<OwnerId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The id, ignoring blank ones.
    pub fn existing_id(&self) -> Option<&OwnerId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }

    /// Extra fields minus the ones the store stamps itself.
    pub fn writable_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()) && *key != "owner_name")
    }

    /// Merge-write payload: present fields plus the given date stamps.
    pub fn merge_payload(&self, date_added: Option<&str>, last_updated: &str) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(name) = &self.owner_name {
            payload.insert("owner_name".to_string(), Value::String(name.clone()));
        }
        for (key, value) in self.writable_fields() {
            payload.insert(key.clone(), value.clone());
        }
        if let Some(date_added) = date_added {
            payload.insert(
                "date_added".to_string(),
                Value::String(date_added.to_string()),
            );
        }
        payload.insert(
            "last_updated".to_string(),
            Value::String(last_updated.to_string()),
        );
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_owner_id_unique() {
        let id1 = OwnerId::generate();
        let id2 = OwnerId::generate();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 32);
    }

    #[test]
    fn test_owner_new_stamps_both_dates() {
        let owner = Owner::new("Aria", "2024-05-01");
        assert_eq!(owner.date_added, "2024-05-01");
        assert_eq!(owner.date_added, owner.last_updated);
    }

    #[test]
    fn test_to_document_strips_id() {
        let owner = Owner::new("Aria", "2024-05-01").with_field("stories", 3);
        let fields = owner.to_document().unwrap();

        assert!(!fields.contains_key("id"));
        assert_eq!(fields["owner_name"], json!("Aria"));
        assert_eq!(fields["stories"], json!(3));
    }

    #[test]
    fn test_from_document_restores_id_from_key() {
        let fields = json!({
            "owner_name": "Bram",
            "date_added": "2024-01-02",
            "last_updated": "2024-01-03",
            "region": "north"
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };

        let owner = Owner::from_document("doc-7", fields).unwrap();
        assert_eq!(owner.id.as_str(), "doc-7");
        assert_eq!(owner.owner_name, "Bram");
        assert_eq!(owner.extra["region"], json!("north"));
    }

    #[test]
    fn test_missing_id_is_generated_on_deserialize() {
        let owner: Owner = serde_json::from_value(json!({"owner_name": "Cleo"})).unwrap();
        assert!(!owner.id.is_blank());
        assert!(owner.date_added.is_empty());
    }

    #[test]
    fn test_merge_draft_keeps_absent_fields() {
        let mut owner = Owner::new("Aria", "2024-05-01")
            .with_field("stories", 3)
            .with_field("region", "east");
        let draft = OwnerDraft::for_id(owner.id.clone())
            .with_field("stories", 4)
            .with_field("date_added", "1999-01-01");

        owner.merge_draft(&draft);

        assert_eq!(owner.owner_name, "Aria");
        assert_eq!(owner.extra["stories"], json!(4));
        assert_eq!(owner.extra["region"], json!("east"));
        assert_eq!(owner.date_added, "2024-05-01");
        assert!(!owner.extra.contains_key("date_added"));
    }

    #[test]
    fn test_merge_payload_only_carries_present_fields() {
        let draft = OwnerDraft::for_id("abc").with_field("stories", 9);
        let payload = draft.merge_payload(None, "2024-06-01");

        assert_eq!(
            Value::Object(payload),
            json!({"stories": 9, "last_updated": "2024-06-01"})
        );
    }
}
