use crate::error::IndexError;
use crate::models::{ContentHit, HighlightConfig, IndexDocument, IndexedEntry};
use crate::traits::SearchIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

/// Page size used when resolving a storage name to its index entries.
const MATCH_PAGE_SIZE: usize = 1000;

pub struct ElasticIndex {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
}

impl ElasticIndex {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Result<Self, IndexError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;
        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.into(),
        })
    }

    pub async fn ensure_index(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .head(format!("{}/{}", self.endpoint, self.index_name))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(IndexError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(format!("{}/{}", self.endpoint, self.index_name))
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        "original_name": {"type": "keyword"},
                        "content": {"type": "text"},
                        "storage_name": {"type": "keyword"},
                        "indexed_at": {"type": "date"}
                    }
                }
            }))
            .send()
            .await?;

        if response.status().is_server_error() || response.status().is_client_error() {
            return Err(IndexError::Request(format!(
                "elasticsearch index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Drop the whole index. Absent index counts as already dropped.
    pub async fn delete_index(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.endpoint, self.index_name))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }

        Err(IndexError::BackendResponse {
            backend: "elasticsearch".to_string(),
            details: response.status().to_string(),
        })
    }

    async fn search(&self, body: &Value) -> Result<Value, IndexError> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn index_document(&self, document: &IndexDocument) -> Result<(), IndexError> {
        let response = self
            .client
            .post(format!("{}/{}/_doc", self.endpoint, self.index_name))
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn all_documents(&self, page_size: usize) -> Result<Vec<IndexedEntry>, IndexError> {
        let body = self
            .search(&json!({
                "size": page_size,
                "query": {"match_all": {}}
            }))
            .await?;

        Ok(hits_array(&body).iter().map(entry_from_hit).collect())
    }

    async fn query_content(
        &self,
        term: &str,
        highlight: &HighlightConfig,
    ) -> Result<Vec<ContentHit>, IndexError> {
        let body = self
            .search(&json!({
                "query": {
                    "match": {"content": term}
                },
                "highlight": {
                    "encoder": "html",
                    "pre_tags": [highlight.pre_tag],
                    "post_tags": [highlight.post_tag],
                    "fields": {
                        "content": {
                            "fragment_size": highlight.fragment_size,
                            "number_of_fragments": highlight.number_of_fragments
                        }
                    }
                }
            }))
            .await?;

        Ok(hits_array(&body).iter().map(content_hit).collect())
    }

    async fn find_by_storage_name(
        &self,
        storage_name: &str,
    ) -> Result<Vec<IndexedEntry>, IndexError> {
        let body = self
            .search(&json!({
                "size": MATCH_PAGE_SIZE,
                "query": {
                    "term": {"storage_name": storage_name}
                }
            }))
            .await?;

        Ok(hits_array(&body).iter().map(entry_from_hit).collect())
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), IndexError> {
        let response = self
            .client
            .delete(format!("{}/{}/_doc/{}", self.endpoint, self.index_name, id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            return Ok(());
        }

        Err(IndexError::BackendResponse {
            backend: "elasticsearch".to_string(),
            details: response.status().to_string(),
        })
    }

    async fn delete_by_storage_name(&self, storage_name: &str) -> Result<u64, IndexError> {
        let response = self
            .client
            .post(format!(
                "{}/{}/_delete_by_query?refresh=true",
                self.endpoint, self.index_name
            ))
            .json(&json!({
                "query": {
                    "term": {"storage_name": storage_name}
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(body.pointer("/deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn refresh(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .post(format!("{}/{}/_refresh", self.endpoint, self.index_name))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }
}

fn hits_array(body: &Value) -> Vec<Value> {
    body.pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn entry_from_hit(hit: &Value) -> IndexedEntry {
    let id = hit
        .pointer("/_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let original_name = hit
        .pointer("/_source/original_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let content = hit
        .pointer("/_source/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let storage_name = hit
        .pointer("/_source/storage_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let indexed_at = hit
        .pointer("/_source/indexed_at")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
        .unwrap_or_else(Utc::now);

    IndexedEntry {
        id,
        document: IndexDocument {
            original_name,
            content,
            storage_name,
            indexed_at,
        },
    }
}

fn content_hit(hit: &Value) -> ContentHit {
    let highlights = hit
        .pointer("/highlight/content")
        .and_then(Value::as_array)
        .map(|fragments| {
            fragments
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ContentHit {
        id: hit
            .pointer("/_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        original_name: hit
            .pointer("/_source/original_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        storage_name: hit
            .pointer("/_source/storage_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        highlights,
        score: hit.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_hit() {
        let hit = json!({
            "_id": "abc123",
            "_score": 2.5,
            "_source": {
                "original_name": "invoice.pdf",
                "content": "Amount due: 40",
                "storage_name": "001.pdf",
                "indexed_at": "2024-05-01T12:00:00Z"
            },
            "highlight": {
                "content": ["Amount <em>due</em>: 40"]
            }
        });

        let entry = entry_from_hit(&hit);
        assert_eq!(entry.id, "abc123");
        assert_eq!(entry.document.original_name, "invoice.pdf");
        assert_eq!(entry.document.storage_name, "001.pdf");
        assert_eq!(
            entry.document.indexed_at.to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );

        let hit = content_hit(&hit);
        assert_eq!(hit.storage_name, "001.pdf");
        assert_eq!(hit.highlights, ["Amount <em>due</em>: 40"]);
        assert!((hit.score - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn tolerates_missing_source_fields() {
        let hit = json!({"_id": "only-an-id"});
        let entry = entry_from_hit(&hit);
        assert_eq!(entry.id, "only-an-id");
        assert_eq!(entry.document.storage_name, "");

        let hit = content_hit(&hit);
        assert!(hit.highlights.is_empty());
        assert_eq!(hit.score, 0.0);
    }

    #[test]
    fn missing_hits_parse_as_empty() {
        assert!(hits_array(&json!({})).is_empty());
        assert!(hits_array(&json!({"hits": {"total": 0}})).is_empty());
    }

    #[test]
    fn rejects_unparseable_endpoints() {
        assert!(ElasticIndex::new("not a url", "pdfs").is_err());
        assert!(ElasticIndex::new("http://localhost:9200/", "pdfs").is_ok());
    }
}
