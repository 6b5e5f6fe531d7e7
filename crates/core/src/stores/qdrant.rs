use crate::error::IndexError;
use crate::models::{IndexChunk, SearchHit};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const UPSERT_BATCH: usize = 256;
const SCROLL_PAGE: usize = 256;

pub struct QdrantStore {
    endpoint: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.endpoint, name)
    }

    async fn result(response: Response) -> Result<Value, IndexError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::BackendResponse {
                backend: "qdrant".to_string(),
                details: format!("{status}: {body}"),
            });
        }
        let parsed: Value = response.json().await?;
        Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn point_id(chunk_id: &str) -> Result<Uuid, IndexError> {
    let prefix = chunk_id.get(..32).unwrap_or(chunk_id);
    Uuid::parse_str(prefix)
        .map_err(|error| IndexError::InvalidArgument(format!("chunk id {chunk_id}: {error}")))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        let response = self.client.get(self.collection_url(name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::result(response).await?;
        Ok(true)
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url(name)))
            .json(&json!({ "exact": true }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::MissingCollection(name.to_string()));
        }
        let result = Self::result(response).await?;
        Ok(result.pointer("/count").and_then(Value::as_u64).unwrap_or(0) as usize)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        let response = self.client.delete(self.collection_url(name)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::result(response).await?;
        Ok(())
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        let response = self
            .client
            .put(self.collection_url(name))
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" }
            }))
            .send()
            .await?;
        Self::result(response).await?;
        Ok(())
    }

    async fn upsert(
        &self,
        name: &str,
        chunks: &[IndexChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::InvalidArgument(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let points = chunks
            .iter()
            .zip(embeddings.iter())
            .map(|(chunk, embedding)| -> Result<Value, IndexError> {
                Ok(json!({
                    "id": point_id(&chunk.chunk_id)?,
                    "vector": embedding,
                    "payload": serde_json::to_value(chunk)?,
                }))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        for batch in points.chunks(UPSERT_BATCH) {
            let response = self
                .client
                .put(format!("{}/points?wait=true", self.collection_url(name)))
                .json(&json!({ "points": batch }))
                .send()
                .await?;
            Self::result(response).await?;
        }

        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url(name)))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IndexError::MissingCollection(name.to_string()));
        }

        let hits = Self::result(response)
            .await?
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut result = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
            let chunk: IndexChunk =
                serde_json::from_value(hit.get("payload").cloned().unwrap_or(Value::Null))?;
            result.push(SearchHit {
                chunk_id: chunk.chunk_id,
                score,
                text: chunk.text,
                metadata: chunk.metadata,
            });
        }

        Ok(result)
    }

    async fn scroll(&self, name: &str) -> Result<Vec<IndexChunk>, IndexError> {
        let mut chunks = Vec::new();
        let mut offset = Value::Null;

        loop {
            let mut body = json!({ "limit": SCROLL_PAGE, "with_payload": true, "with_vector": false });
            if !offset.is_null() {
                body["offset"] = offset.clone();
            }
            let response = self
                .client
                .post(format!("{}/points/scroll", self.collection_url(name)))
                .json(&body)
                .send()
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(IndexError::MissingCollection(name.to_string()));
            }

            let result = Self::result(response).await?;
            for point in result
                .pointer("/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
            {
                chunks.push(serde_json::from_value::<IndexChunk>(
                    point.get("payload").cloned().unwrap_or(Value::Null),
                )?);
            }

            offset = result.get("next_page_offset").cloned().unwrap_or(Value::Null);
            if offset.is_null() {
                break;
            }
        }

        chunks.sort_by_key(|chunk| (chunk.record_index, chunk.chunk_index));
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn point(record_index: usize, name: &str) -> Value {
        let chunk = IndexChunk {
            chunk_id: format!("{record_index:064}"),
            record_index,
            chunk_index: 0,
            text: format!("Company: {name}"),
            metadata: ChunkMetadata {
                name: name.to_string(),
                ..Default::default()
            },
        };
        json!({ "id": record_index, "payload": serde_json::to_value(chunk).unwrap() })
    }

    #[test]
    fn point_ids_derive_from_chunk_hash() {
        let chunk_id = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        let id = point_id(chunk_id).unwrap();
        assert_eq!(id.simple().to_string(), &chunk_id[..32]);
        assert!(point_id("not-hex").is_err());
    }

    #[tokio::test]
    async fn missing_collections_are_reported_without_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": { "error": "Not found: Collection `missing` doesn't exist!" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/collections/companies"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": { "status": "green" }, "status": "ok" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/collections/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let store = QdrantStore::new(format!("{}/", server.uri()));
        assert!(!store.collection_exists("missing").await.unwrap());
        assert!(store.collection_exists("companies").await.unwrap());
        store.delete_collection("missing").await.unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn backend_errors_surface_as_backend_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/companies"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        let result = store.collection_exists("companies").await;
        assert!(matches!(result, Err(IndexError::BackendResponse { .. })));
    }

    #[tokio::test]
    async fn scroll_follows_page_offsets_and_orders_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/companies/points/scroll"))
            .and(body_partial_json(json!({ "offset": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "points": [point(0, "Alpha")], "next_page_offset": null },
                "status": "ok"
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/companies/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": { "points": [point(2, "Gamma"), point(1, "Beta")], "next_page_offset": 7 },
                "status": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        let names: Vec<String> = store
            .scroll("companies")
            .await
            .unwrap()
            .into_iter()
            .map(|chunk| chunk.metadata.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);
        server.verify().await;
    }

    #[tokio::test]
    async fn scroll_of_a_missing_collection_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/companies/points/scroll"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = QdrantStore::new(server.uri());
        assert!(matches!(
            store.scroll("companies").await,
            Err(IndexError::MissingCollection(_))
        ));
    }
}
