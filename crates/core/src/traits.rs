use crate::error::SearchError;
use crate::models::DocumentRecord;
use async_trait::async_trait;
use serde_json::Value;

/// Narrow contract over the search engine. Implementations must be safe
/// to share across ingestion workers writing to different ids.
#[async_trait]
pub trait DocumentStore {
    async fn index_exists(&self) -> Result<bool, SearchError>;

    async fn create_index(&self) -> Result<(), SearchError>;

    /// Full-document overwrite keyed by the record's relative path.
    async fn upsert(&self, record: &DocumentRecord) -> Result<(), SearchError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<DocumentRecord>, SearchError>;

    /// Raw engine response for a query body built by the search module.
    async fn search(&self, body: &Value) -> Result<Value, SearchError>;

    /// Legacy all-at-once path; per-item failures surface only as the
    /// aggregate errors flag.
    async fn bulk_upsert(&self, records: &[DocumentRecord]) -> Result<bool, SearchError>;

    /// Makes just-written documents visible to subsequent searches.
    async fn refresh(&self) -> Result<(), SearchError>;
}
