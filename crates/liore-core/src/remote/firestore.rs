//! Cloud Firestore backend over the REST v1 API.
//!
//! Reads page through the collection, single writes use `PATCH` (with an
//! `updateMask` for merge writes), and batches go through `documents:commit`,
//! which applies all of its writes atomically. Firestore caps a commit at 500
//! writes; larger batches are split, so only each chunk is atomic. The change
//! feed polls the collection and emits a snapshot whenever its contents differ
//! from the previous poll.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::value::{decode_fields, encode_fields};
use super::{
    BatchOp, Document, RemoteError, RemoteResult, RemoteStore, RemoteWatch, WatchEvent, WatchGuard,
    WriteMode,
};
use crate::config::StoreConfig;
use crate::util::{is_http_url, normalize_text_option, summarize_error_body};

const MAX_BATCH_WRITES: usize = 500;
const LIST_PAGE_SIZE: usize = 300;

/// Where the collection lives.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FirestoreTarget {
    base_url: String,
    project_id: String,
    database_id: String,
    collection: String,
}

impl FirestoreTarget {
    fn resolve(config: &StoreConfig) -> RemoteResult<Self> {
        let project_id = normalize_text_option(config.firebase.project_id.clone())
            .ok_or_else(|| RemoteError::Misconfigured("Firebase project id is not set".into()))?;

        let base_url = config.firebase.base_url();
        if !is_http_url(&base_url) {
            return Err(RemoteError::Misconfigured(format!(
                "Firestore base URL must include http:// or https://: {base_url}"
            )));
        }

        let collection = config.collection.trim().to_string();
        if collection.is_empty() || collection.contains('/') {
            return Err(RemoteError::Misconfigured(format!(
                "invalid collection name '{collection}'"
            )));
        }

        Ok(Self {
            base_url,
            project_id,
            database_id: config.firebase.database_id(),
            collection,
        })
    }

    fn documents_root(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database_id
        )
    }

    /// Resource name used inside commit payloads
    fn document_name(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.documents_root(), self.collection)
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.documents_root(),
            self.collection
        )
    }

    fn document_url(&self, key: &str) -> String {
        format!("{}/{}", self.collection_url(), urlencoding::encode(key))
    }

    fn commit_url(&self) -> String {
        format!("{}/{}:commit", self.base_url, self.documents_root())
    }
}

/// Quote a field name for use in a Firestore field path.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn encode_write(target: &FirestoreTarget, op: &BatchOp) -> Value {
    match op {
        BatchOp::Set { key, fields, mode } => {
            let mut write = json!({
                "update": {
                    "name": target.document_name(key),
                    "fields": encode_fields(fields),
                }
            });
            if *mode == WriteMode::Merge {
                let paths: Vec<String> = fields.keys().map(|name| field_path(name)).collect();
                write["updateMask"] = json!({ "fieldPaths": paths });
            }
            write
        }
        BatchOp::Delete { key } => json!({ "delete": target.document_name(key) }),
    }
}

fn key_from_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreDocument {
    fn into_document(self) -> RemoteResult<Document> {
        let fields = decode_fields(&self.fields)?;
        Ok(Document::new(key_from_name(&self.name), fields))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> RemoteError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|payload| payload.error)
        .map(|detail| {
            let message = detail.message.unwrap_or_default();
            match detail.status {
                Some(code) => format!("{} [{code}]", message.trim()),
                None => message.trim().to_string(),
            }
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| summarize_error_body(body));

    let message = if detail.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{detail} ({})", status.as_u16())
    };

    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RemoteError::Unavailable(message)
    } else {
        RemoteError::Rejected(message)
    }
}

async fn check(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(parse_api_error(status, &body))
}

/// Connected HTTP client for one collection.
#[derive(Clone)]
struct FirestoreClient {
    http: reqwest::Client,
    target: FirestoreTarget,
    api_key: Option<String>,
    auth_token: Option<String>,
}

impl FirestoreClient {
    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(api_key) = &self.api_key {
            request = request.query(&[("key", api_key)]);
        }
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn list(&self) -> RemoteResult<Vec<Document>> {
        let url = self.target.collection_url();
        let page_size = LIST_PAGE_SIZE.to_string();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &url)
                .query(&[("pageSize", page_size.as_str())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page = check(request.send().await?)
                .await?
                .json::<ListDocumentsResponse>()
                .await?;
            for document in page.documents {
                documents.push(document.into_document()?);
            }

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(count = documents.len(), "Listed Firestore collection");
        Ok(documents)
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Document>> {
        let response = self
            .request(Method::GET, &self.target.document_url(key))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document = check(response)
            .await?
            .json::<FirestoreDocument>()
            .await?
            .into_document()?;
        Ok(Some(document))
    }

    async fn upsert(
        &self,
        key: &str,
        fields: &Map<String, Value>,
        mode: WriteMode,
    ) -> RemoteResult<()> {
        let mut request = self.request(Method::PATCH, &self.target.document_url(key));
        if mode == WriteMode::Merge {
            if fields.is_empty() {
                return Ok(());
            }
            let mask: Vec<(&str, String)> = fields
                .keys()
                .map(|name| ("updateMask.fieldPaths", field_path(name)))
                .collect();
            request = request.query(&mask);
        }

        check(
            request
                .json(&json!({ "fields": encode_fields(fields) }))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        let response = self
            .request(Method::DELETE, &self.target.document_url(key))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn commit(&self, ops: &[BatchOp]) -> RemoteResult<()> {
        if ops.len() > MAX_BATCH_WRITES {
            tracing::warn!(
                writes = ops.len(),
                "Batch exceeds {MAX_BATCH_WRITES} writes; committing in chunks"
            );
        }

        for chunk in ops.chunks(MAX_BATCH_WRITES) {
            let writes: Vec<Value> = chunk
                .iter()
                .map(|op| encode_write(&self.target, op))
                .collect();
            check(
                self.request(Method::POST, &self.target.commit_url())
                    .json(&json!({ "writes": writes }))
                    .send()
                    .await?,
            )
            .await?;
        }
        Ok(())
    }

    async fn probe(&self) -> RemoteResult<()> {
        check(
            self.request(Method::GET, &self.target.collection_url())
                .query(&[("pageSize", "1")])
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }
}

/// Polls the collection and forwards snapshots that differ from the last one.
///
/// The first successful poll only establishes the baseline. Consecutive
/// failures are reported once until a poll succeeds again.
async fn poll_changes(
    client: FirestoreClient,
    interval: Duration,
    events: mpsc::UnboundedSender<WatchEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous: Option<Vec<Document>> = None;
    let mut failing = false;

    loop {
        ticker.tick().await;
        if events.is_closed() {
            break;
        }

        match client.list().await {
            Ok(documents) => {
                failing = false;
                let changed = previous
                    .as_ref()
                    .is_some_and(|previous| *previous != documents);
                if changed && events.send(WatchEvent::Snapshot(documents.clone())).is_err() {
                    break;
                }
                previous = Some(documents);
            }
            Err(error) => {
                if !failing {
                    failing = true;
                    tracing::warn!("Firestore change poll failed: {error}");
                    if events.send(WatchEvent::Error(error)).is_err() {
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("Firestore change feed stopped");
}

/// Firestore-backed [`RemoteStore`].
pub struct FirestoreRemote {
    config: StoreConfig,
    client: OnceLock<FirestoreClient>,
}

impl FirestoreRemote {
    pub const fn new(config: StoreConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn client(&self) -> RemoteResult<&FirestoreClient> {
        self.client
            .get()
            .ok_or_else(|| RemoteError::Unavailable("Firestore is not connected".to_string()))
    }

    fn build_client(&self) -> RemoteResult<FirestoreClient> {
        let target = FirestoreTarget::resolve(&self.config)?;
        if let Some(problem) = self.config.timing_problem() {
            return Err(RemoteError::Misconfigured(problem));
        }
        let http = reqwest::Client::builder()
            .timeout(self.config.request_timeout())
            .build()?;
        Ok(FirestoreClient {
            http,
            target,
            api_key: normalize_text_option(self.config.firebase.api_key.clone()),
            auth_token: normalize_text_option(self.config.firebase.auth_token.clone()),
        })
    }
}

impl RemoteStore for FirestoreRemote {
    async fn connect(&self) -> RemoteResult<()> {
        if self.client.get().is_some() {
            return Ok(());
        }
        let client = self.build_client()?;
        tracing::info!(
            project = %client.target.project_id,
            collection = %client.target.collection,
            "Firestore client ready"
        );
        // A concurrent connect may have won the race; either client is equivalent.
        let _ = self.client.set(client);
        Ok(())
    }

    async fn list(&self) -> RemoteResult<Vec<Document>> {
        self.client()?.list().await
    }

    async fn get(&self, key: &str) -> RemoteResult<Option<Document>> {
        self.client()?.get(key).await
    }

    async fn upsert(
        &self,
        key: &str,
        fields: Map<String, Value>,
        mode: WriteMode,
    ) -> RemoteResult<()> {
        self.client()?.upsert(key, &fields, mode).await
    }

    async fn delete(&self, key: &str) -> RemoteResult<()> {
        self.client()?.delete(key).await
    }

    async fn commit(&self, ops: Vec<BatchOp>) -> RemoteResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.client()?.commit(&ops).await
    }

    async fn probe(&self) -> RemoteResult<()> {
        self.client()?.probe().await
    }

    fn watch(&self) -> RemoteResult<RemoteWatch> {
        let client = self.client()?.clone();
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_changes(client, self.config.poll_interval(), sender));
        Ok(RemoteWatch::new(receiver, WatchGuard::new(move || task.abort())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> StoreConfig {
        let mut config = StoreConfig::default();
        config.firebase.project_id = Some("liore-verse".to_string());
        config
    }

    #[test]
    fn target_builds_rest_urls() {
        let target = FirestoreTarget::resolve(&config()).unwrap();

        assert_eq!(
            target.collection_url(),
            "https://firestore.googleapis.com/v1/projects/liore-verse/databases/(default)/documents/storyOwners"
        );
        assert_eq!(
            target.document_url("a b"),
            "https://firestore.googleapis.com/v1/projects/liore-verse/databases/(default)/documents/storyOwners/a%20b"
        );
        assert_eq!(
            target.commit_url(),
            "https://firestore.googleapis.com/v1/projects/liore-verse/databases/(default)/documents:commit"
        );
    }

    #[test]
    fn target_requires_project_and_valid_collection() {
        assert!(matches!(
            FirestoreTarget::resolve(&StoreConfig::default()),
            Err(RemoteError::Misconfigured(_))
        ));

        let mut nested = config();
        nested.collection = "owners/inner".to_string();
        assert!(FirestoreTarget::resolve(&nested).is_err());

        let mut bad_url = config();
        bad_url.firebase.base_url = Some("localhost:8080".to_string());
        assert!(FirestoreTarget::resolve(&bad_url).is_err());
    }

    #[test]
    fn field_paths_quote_non_identifiers() {
        assert_eq!(field_path("owner_name"), "owner_name");
        assert_eq!(field_path("first name"), "`first name`");
        assert_eq!(field_path("2fa"), "`2fa`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn merge_writes_carry_update_mask() {
        let target = FirestoreTarget::resolve(&config()).unwrap();
        let mut fields = Map::new();
        fields.insert("owner_name".to_string(), json!("Aria"));

        let merge = encode_write(
            &target,
            &BatchOp::Set {
                key: "a".to_string(),
                fields: fields.clone(),
                mode: WriteMode::Merge,
            },
        );
        assert_eq!(merge["updateMask"], json!({"fieldPaths": ["owner_name"]}));
        assert_eq!(
            merge["update"]["fields"]["owner_name"],
            json!({"stringValue": "Aria"})
        );

        let overwrite = encode_write(
            &target,
            &BatchOp::Set {
                key: "a".to_string(),
                fields,
                mode: WriteMode::Overwrite,
            },
        );
        assert!(overwrite.get("updateMask").is_none());

        let delete = encode_write(
            &target,
            &BatchOp::Delete {
                key: "gone".to_string(),
            },
        );
        assert_eq!(
            delete,
            json!({"delete": "projects/liore-verse/databases/(default)/documents/storyOwners/gone"})
        );
    }

    #[test]
    fn api_errors_are_classified_by_status() {
        let body = r#"{"error": {"code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED"}}"#;
        let error = parse_api_error(StatusCode::FORBIDDEN, body);
        assert!(matches!(error, RemoteError::Rejected(_)));
        assert!(error.to_string().contains("PERMISSION_DENIED"));

        let error = parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(matches!(error, RemoteError::Unavailable(ref message) if message == "HTTP 503"));
    }

    #[test]
    fn proxy_error_pages_become_one_line_messages() {
        let page = "<html>\n<head><title>502 Bad Gateway</title></head>\n<body>\n\
                    <center><h1>502 Bad Gateway</h1></center>\n</body>\n</html>\n";

        let error = parse_api_error(StatusCode::BAD_GATEWAY, page);

        assert!(matches!(
            error,
            RemoteError::Unavailable(ref message) if message == "502 Bad Gateway 502 Bad Gateway (502)"
        ));
    }

    #[test]
    fn document_key_comes_from_resource_name() {
        assert_eq!(
            key_from_name("projects/p/databases/(default)/documents/storyOwners/abc123"),
            "abc123"
        );
    }

    #[tokio::test]
    async fn connect_fails_without_project() {
        let remote = FirestoreRemote::new(StoreConfig::default());
        assert!(matches!(
            remote.connect().await,
            Err(RemoteError::Misconfigured(_))
        ));
        assert!(remote.list().await.is_err());
    }

    #[tokio::test]
    async fn connect_rejects_zero_timing_values() {
        let mut zero_poll = config();
        zero_poll.poll_interval_ms = 0;
        let remote = FirestoreRemote::new(zero_poll);
        assert!(matches!(
            remote.connect().await,
            Err(RemoteError::Misconfigured(message)) if message.contains("poll_interval_ms")
        ));
        assert!(remote.watch().is_err());

        let mut zero_timeout = config();
        zero_timeout.request_timeout_secs = 0;
        assert!(matches!(
            FirestoreRemote::new(zero_timeout).connect().await,
            Err(RemoteError::Misconfigured(message)) if message.contains("request_timeout_secs")
        ));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let remote = FirestoreRemote::new(config());
        remote.connect().await.unwrap();
        remote.connect().await.unwrap();
        assert!(remote.client().is_ok());
    }
}
