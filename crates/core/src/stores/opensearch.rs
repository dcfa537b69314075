use crate::error::SearchError;
use crate::models::DocumentRecord;
use crate::traits::DocumentStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// OpenSearch-backed document store speaking the plain REST API.
/// Documents are keyed by relative path, so ids may contain slashes and
/// are percent-encoded into a single path segment.
pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn doc_url(&self, id: &str) -> Result<Url, SearchError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| SearchError::Request("endpoint cannot be a base url".to_string()))?
            .extend([self.index_name.as_str(), "_doc", id]);
        Ok(url)
    }

    fn index_url(&self, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", self.endpoint, self.index_name)
        } else {
            format!("{}/{}/{}", self.endpoint, self.index_name, suffix)
        }
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn index_exists(&self) -> Result<bool, SearchError> {
        let response = self.client.head(self.index_url("")).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(true);
        }

        if response.status().is_client_error() {
            return Ok(false);
        }

        Err(SearchError::BackendResponse {
            backend: "opensearch".to_string(),
            details: response.status().to_string(),
        })
    }

    async fn create_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.index_url(""))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        "filename": {"type": "keyword"},
                        "absolute_path": {"type": "keyword"},
                        "relative_path": {"type": "keyword"},
                        "directory_structure": {"type": "keyword"},
                        "pages": {
                            "type": "nested",
                            "properties": {
                                "number": {"type": "integer"},
                                "content": {"type": "text", "analyzer": "standard"},
                                "is_image": {"type": "boolean"},
                                "confidence": {"type": "float"}
                            }
                        },
                        "total_pages": {"type": "integer"},
                        "metadata": {
                            "properties": {
                                "author": {"type": "text"},
                                "title": {"type": "text"},
                                // keyword, not date: absent values are
                                // indexed as the "unavailable" sentinel.
                                "creation_date": {"type": "keyword"}
                            }
                        },
                        "document_info": {
                            "properties": {
                                "page_count": {"type": "integer"},
                                "file_size_bytes": {"type": "long"},
                                "processed_at": {"type": "date", "format": "yyyy-MM-dd HH:mm:ss"},
                                "extraction_method": {"type": "keyword"}
                            }
                        },
                        "indexed_at": {"type": "date", "format": "yyyy-MM-dd HH:mm:ss"}
                    }
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn upsert(&self, record: &DocumentRecord) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.doc_url(record.id())?)
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<DocumentRecord>, SearchError> {
        let response = self.client.get(self.doc_url(id)?).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        let source = body.pointer("/_source").cloned().ok_or_else(|| {
            SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: format!("document {id} has no _source"),
            }
        })?;

        Ok(Some(serde_json::from_value(source)?))
    }

    async fn search(&self, body: &Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.index_url("_search"))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }

    async fn bulk_upsert(&self, records: &[DocumentRecord]) -> Result<bool, SearchError> {
        if records.is_empty() {
            return Ok(false);
        }

        let payload = bulk_payload(&self.index_name, records)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(body
            .pointer("/errors")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn refresh(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .post(self.index_url("_refresh"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "opensearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

fn bulk_payload(index_name: &str, records: &[DocumentRecord]) -> Result<String, SearchError> {
    let mut lines = Vec::with_capacity(records.len() * 2);

    for record in records {
        lines.push(serde_json::to_string(&json!({
            "index": {
                "_index": index_name,
                "_id": record.id(),
            }
        }))?);
        lines.push(serde_json::to_string(record)?);
    }

    Ok(lines.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentInfo, DocumentMetadata, ExtractionMethod, RawPage};

    fn record(relative_path: &str) -> DocumentRecord {
        DocumentRecord {
            filename: "a.pdf".to_string(),
            absolute_path: format!("/data/pdfs/{relative_path}"),
            relative_path: relative_path.to_string(),
            directory_structure: "/data/pdfs/reports".to_string(),
            pages: vec![RawPage::text_layer(1, "hello")],
            total_pages: 1,
            metadata: DocumentMetadata::default(),
            document_info: DocumentInfo {
                page_count: 1,
                file_size_bytes: 42,
                processed_at: "2024-01-12 23:59:59".to_string(),
                extraction_method: ExtractionMethod::Text,
            },
            indexed_at: "2024-01-12 23:59:59".to_string(),
        }
    }

    #[test]
    fn document_url_escapes_slashes_in_ids() {
        let store = OpenSearchStore::new("http://localhost:9200", "pdfs");
        let url = store.doc_url("reports/2024/a.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9200/pdfs/_doc/reports%2F2024%2Fa.pdf"
        );
    }

    #[test]
    fn bulk_payload_pairs_action_and_document_lines() {
        let records = vec![record("a.pdf"), record("reports/b.pdf")];
        let payload = bulk_payload("pdfs", &records).unwrap();

        let lines: Vec<&str> = payload.trim_end().split('\n').collect();
        assert_eq!(lines.len(), 4);

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], "a.pdf");
        assert_eq!(action["index"]["_index"], "pdfs");

        let document: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(document["relative_path"], "a.pdf");
        assert_eq!(document["pages"][0]["content"], "hello");
        assert!(payload.ends_with('\n'));
    }

    #[test]
    fn record_round_trips_through_source_json() {
        let original = record("reports/b.pdf");
        let value = serde_json::to_value(&original).unwrap();
        let parsed: DocumentRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.relative_path, "reports/b.pdf");
        assert_eq!(parsed.document_info.extraction_method, ExtractionMethod::Text);
    }
}
