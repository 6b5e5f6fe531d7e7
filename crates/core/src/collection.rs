use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{ChunkMetadata, SearchHit};
use crate::traits::VectorStore;
use std::collections::HashSet;

pub const DEFAULT_TOP_K: usize = 5;

/// A live collection bound to the embedder and store it was built with.
pub struct CollectionHandle<'a, E, S> {
    name: String,
    chunk_count: usize,
    embedder: &'a E,
    store: &'a S,
}

impl<'a, E, S> CollectionHandle<'a, E, S>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub(crate) fn new(name: &str, chunk_count: usize, embedder: &'a E, store: &'a S) -> Self {
        Self {
            name: name.to_string(),
            chunk_count,
            embedder,
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chunks written when the handle was created or opened.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub async fn count(&self) -> Result<usize, IndexError> {
        self.store.count(&self.name).await
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.trim().is_empty() {
            return Err(IndexError::InvalidArgument("query is empty".to_string()));
        }
        let vector = self.embedder.embed(query).await?;
        self.store.search(&self.name, &vector, top_k.max(1)).await
    }

    pub async fn companies(&self) -> Result<Vec<ChunkMetadata>, IndexError> {
        list_companies(self.store, &self.name).await
    }
}

/// One entry per indexed company, sorted by name without regard to case. The
/// first chunk of each record supplies its metadata, so companies that share
/// a name (or have none) are all listed. Only the store is consulted.
pub async fn list_companies<S>(store: &S, name: &str) -> Result<Vec<ChunkMetadata>, IndexError>
where
    S: VectorStore + Send + Sync + ?Sized,
{
    if !store.collection_exists(name).await? {
        return Err(IndexError::MissingCollection(name.to_string()));
    }

    let mut seen = HashSet::new();
    let mut companies: Vec<(usize, ChunkMetadata)> = store
        .scroll(name)
        .await?
        .into_iter()
        .filter(|chunk| seen.insert(chunk.record_index))
        .map(|chunk| (chunk.record_index, chunk.metadata))
        .collect();

    companies.sort_by(|(left_index, left), (right_index, right)| {
        left.name
            .to_lowercase()
            .cmp(&right.name.to_lowercase())
            .then_with(|| left_index.cmp(right_index))
    });
    Ok(companies.into_iter().map(|(_, metadata)| metadata).collect())
}

/// Keeps the entries whose name contains `term`, ignoring case. A blank term
/// keeps everything.
pub fn filter_companies(companies: Vec<ChunkMetadata>, term: &str) -> Vec<ChunkMetadata> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return companies;
    }
    companies
        .into_iter()
        .filter(|entry| entry.name.to_lowercase().contains(&needle))
        .collect()
}
