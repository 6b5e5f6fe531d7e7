//! Directory-backed vector store: one JSON document per collection, searched
//! by brute-force cosine similarity.

use crate::error::IndexError;
use crate::models::{IndexChunk, SearchHit};
use crate::traits::VectorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize)]
struct StoredCollection {
    name: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    chunk: IndexChunk,
    embedding: Vec<f32>,
}

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_path(&self, name: &str) -> Result<PathBuf, IndexError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(IndexError::InvalidArgument(format!(
                "collection name `{name}` may only contain letters, digits, `_` and `-`"
            )));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    async fn load(&self, name: &str) -> Result<StoredCollection, IndexError> {
        let path = self.collection_path(name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(IndexError::MissingCollection(name.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn save(&self, collection: &StoredCollection) -> Result<(), IndexError> {
        let path = self.collection_path(&collection.name)?;
        fs::create_dir_all(&self.root).await?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec(collection)?).await?;
        fs::rename(&staging, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(fs::try_exists(self.collection_path(name)?).await?)
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        Ok(self.load(name).await?.entries.len())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        match fs::remove_file(self.collection_path(name)?).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        if self.collection_exists(name).await? {
            return Err(IndexError::InvalidArgument(format!(
                "collection `{name}` already exists"
            )));
        }
        self.save(&StoredCollection {
            name: name.to_string(),
            dimensions,
            created_at: Utc::now(),
            entries: Vec::new(),
        })
        .await
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

        let mut collection = self.load(name).await?;
        let mut positions: HashMap<String, usize> = collection
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.chunk.chunk_id.clone(), position))
            .collect();

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            if embedding.len() != collection.dimensions {
                return Err(IndexError::InvalidArgument(format!(
                    "embedding dimension {} != {}",
                    embedding.len(),
                    collection.dimensions
                )));
            }

            let entry = StoredEntry {
                chunk: chunk.clone(),
                embedding: embedding.clone(),
            };
            match positions.get(&chunk.chunk_id) {
                Some(&position) => collection.entries[position] = entry,
                None => {
                    positions.insert(chunk.chunk_id.clone(), collection.entries.len());
                    collection.entries.push(entry);
                }
            }
        }

        self.save(&collection).await
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let collection = self.load(name).await?;
        if vector.len() != collection.dimensions {
            return Err(IndexError::InvalidArgument(format!(
                "query vector dim {} is not {}",
                vector.len(),
                collection.dimensions
            )));
        }

        let mut hits: Vec<SearchHit> = collection
            .entries
            .into_iter()
            .map(|entry| SearchHit {
                score: cosine_similarity(vector, &entry.embedding),
                chunk_id: entry.chunk.chunk_id,
                text: entry.chunk.text,
                metadata: entry.chunk.metadata,
            })
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn scroll(&self, name: &str) -> Result<Vec<IndexChunk>, IndexError> {
        Ok(self
            .load(name)
            .await?
            .entries
            .into_iter()
            .map(|entry| entry.chunk)
            .collect())
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let norm = |values: &[f32]| {
        values
            .iter()
            .map(|value| f64::from(*value).powi(2))
            .sum::<f64>()
            .sqrt()
    };
    let magnitude = norm(left) * norm(right);
    if magnitude == 0.0 {
        0.0
    } else {
        dot / magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use tempfile::tempdir;

    fn chunk(id: &str, name: &str) -> IndexChunk {
        IndexChunk {
            chunk_id: id.to_string(),
            record_index: 0,
            chunk_index: 0,
            text: format!("Company: {name}"),
            metadata: ChunkMetadata {
                name: name.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn collections_survive_a_new_handle() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.create_collection("companies", 2).await?;
        store
            .upsert("companies", &[chunk("a", "Alpha")], &[vec![1.0, 0.0]])
            .await?;

        let reopened = LocalStore::new(dir.path());
        assert!(reopened.collection_exists("companies").await?);
        assert_eq!(reopened.count("companies").await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn search_orders_by_cosine_similarity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.create_collection("companies", 2).await?;
        store
            .upsert(
                "companies",
                &[chunk("a", "Alpha"), chunk("b", "Beta"), chunk("c", "Gamma")],
                &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
            )
            .await?;

        let hits = store.search("companies", &[0.0, 1.0], 2).await?;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.name, "Beta");
        assert_eq!(hits[1].metadata.name, "Gamma");
        Ok(())
    }

    #[tokio::test]
    async fn upsert_replaces_entries_with_the_same_chunk_id(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.create_collection("companies", 2).await?;
        store
            .upsert(
                "companies",
                &[chunk("a", "Alpha"), chunk("b", "Beta")],
                &[vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .await?;
        store
            .upsert(
                "companies",
                &[chunk("b", "Beta Renamed"), chunk("c", "Gamma"), chunk("c", "Gamma Again")],
                &[vec![0.0, 1.0], vec![0.5, 0.5], vec![0.6, 0.4]],
            )
            .await?;

        let names: Vec<String> = store
            .scroll("companies")
            .await?
            .into_iter()
            .map(|chunk| chunk.metadata.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta Renamed", "Gamma Again"]);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_missing_collections_error(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.delete_collection("companies").await?;
        assert!(!store.collection_exists("companies").await?);
        assert!(matches!(
            store.count("companies").await,
            Err(IndexError::MissingCollection(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_mismatched_dimensions_and_bad_names() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let store = LocalStore::new(dir.path());
        store.create_collection("companies", 3).await?;
        let result = store
            .upsert("companies", &[chunk("a", "Alpha")], &[vec![1.0]])
            .await;
        assert!(matches!(result, Err(IndexError::InvalidArgument(_))));
        assert!(store.create_collection("../escape", 3).await.is_err());
        Ok(())
    }
}
