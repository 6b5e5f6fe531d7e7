use crate::error::{CollectError, IndexError};
use crate::models::{IndexChunk, SearchHit};
use async_trait::async_trait;

/// Renders a page with a JavaScript-capable browser and returns its DOM once
/// `wait_for` matches.
#[async_trait]
pub trait PageRenderer {
    async fn render(&self, url: &str, wait_for: &str) -> Result<String, CollectError>;
}

#[async_trait]
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CollectError>;
}

/// A persistent store of named, similarity-searchable collections.
#[async_trait]
pub trait VectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError>;

    async fn count(&self, name: &str) -> Result<usize, IndexError>;

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError>;

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError>;

    async fn upsert(
        &self,
        name: &str,
        chunks: &[IndexChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError>;

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError>;

    /// Every stored chunk, in insertion order where the backend keeps one.
    async fn scroll(&self, name: &str) -> Result<Vec<IndexChunk>, IndexError>;
}

#[async_trait]
impl<T> VectorStore for Box<T>
where
    T: VectorStore + ?Sized + Send + Sync,
{
    async fn collection_exists(&self, name: &str) -> Result<bool, IndexError> {
        (**self).collection_exists(name).await
    }

    async fn count(&self, name: &str) -> Result<usize, IndexError> {
        (**self).count(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), IndexError> {
        (**self).delete_collection(name).await
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), IndexError> {
        (**self).create_collection(name, dimensions).await
    }

    async fn upsert(
        &self,
        name: &str,
        chunks: &[IndexChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), IndexError> {
        (**self).upsert(name, chunks, embeddings).await
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        (**self).search(name, vector, top_k).await
    }

    async fn scroll(&self, name: &str) -> Result<Vec<IndexChunk>, IndexError> {
        (**self).scroll(name).await
    }
}
