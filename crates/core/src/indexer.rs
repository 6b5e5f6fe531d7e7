use crate::chunking::build_chunks;
use crate::collection::CollectionHandle;
use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{CompanyRecord, IndexingOptions};
use crate::traits::VectorStore;
use tracing::info;

/// Builds a named collection from collected records, replacing any previous
/// collection of the same name.
pub struct Indexer<E, S> {
    embedder: E,
    store: S,
    options: IndexingOptions,
}

impl<E, S> Indexer<E, S>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(embedder: E, store: S, options: IndexingOptions) -> Self {
        Self {
            embedder,
            store,
            options,
        }
    }

    /// Chunks and embeds every record before touching the store, so a provider
    /// failure leaves the existing collection in place. Once embeddings are
    /// ready the old collection is deleted and the new one written; a store
    /// failure from that point on leaves no collection behind.
    pub async fn build_index(
        &self,
        records: &[CompanyRecord],
        name: &str,
    ) -> Result<CollectionHandle<'_, E, S>, IndexError> {
        if records.is_empty() {
            return Err(IndexError::EmptyInput);
        }
        info!(companies = records.len(), collection = %name, "building collection");

        let chunks = build_chunks(records, name, &self.options)?;
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();

        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(IndexError::Embedding(format!(
                "{} embeddings returned for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 || embeddings.iter().any(|vector| vector.len() != dimensions) {
            return Err(IndexError::Embedding(
                "provider returned empty or inconsistent vectors".to_string(),
            ));
        }

        if self.store.collection_exists(name).await? {
            let existing = self.store.count(name).await?;
            info!(collection = %name, chunks = existing, "deleting existing collection");
            self.store.delete_collection(name).await?;
        }

        self.store.create_collection(name, dimensions).await?;
        self.store.upsert(name, &chunks, &embeddings).await?;
        info!(collection = %name, chunks = chunks.len(), dimensions, "collection created");

        Ok(CollectionHandle::new(
            name,
            chunks.len(),
            &self.embedder,
            &self.store,
        ))
    }

    /// Opens an existing collection for querying.
    pub async fn open(&self, name: &str) -> Result<CollectionHandle<'_, E, S>, IndexError> {
        if !self.store.collection_exists(name).await? {
            return Err(IndexError::MissingCollection(name.to_string()));
        }
        let chunk_count = self.store.count(name).await?;
        Ok(CollectionHandle::new(
            name,
            chunk_count,
            &self.embedder,
            &self.store,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::LocalStore;
    use async_trait::async_trait;
    use tempfile::tempdir;

    fn company(name: &str, description: &str) -> CompanyRecord {
        CompanyRecord {
            name: Some(name.to_string()),
            description: description.to_string(),
            category: Some("Software".to_string()),
            ..Default::default()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
            Err(IndexError::Embedding("service unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn empty_input_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let indexer = Indexer::new(
            CharacterNgramEmbedder::default(),
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );
        let result = indexer.build_index(&[], "companies").await;
        assert!(matches!(result, Err(IndexError::EmptyInput)));
        assert!(!LocalStore::new(dir.path()).collection_exists("companies").await?);
        Ok(())
    }

    #[tokio::test]
    async fn every_record_yields_chunks_carrying_its_name() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let indexer = Indexer::new(
            CharacterNgramEmbedder::default(),
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );
        let records = vec![
            company("Alpha", &"long ".repeat(5_000)),
            company("Beta", "short"),
            CompanyRecord::default(),
        ];

        let handle = indexer.build_index(&records, "companies").await?;
        assert!(handle.chunk_count() >= records.len());
        assert_eq!(handle.count().await?, handle.chunk_count());

        let stored = LocalStore::new(dir.path()).scroll("companies").await?;
        for chunk in stored {
            let expected = records[chunk.record_index].name.clone().unwrap_or_default();
            assert_eq!(chunk.metadata.name, expected);
        }
        Ok(())
    }

    #[tokio::test]
    async fn reindexing_replaces_the_previous_collection() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let indexer = Indexer::new(
            CharacterNgramEmbedder::default(),
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );

        indexer
            .build_index(&[company("Old One", "a"), company("Old Two", "b")], "companies")
            .await?;
        let handle = indexer
            .build_index(&[company("Fresh", "c")], "companies")
            .await?;

        assert_eq!(handle.count().await?, 1);
        let names: Vec<String> = handle
            .companies()
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["Fresh"]);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn embedding_failure_keeps_the_previous_collection(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let healthy = Indexer::new(
            CharacterNgramEmbedder::default(),
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );
        healthy
            .build_index(&[company("Kept", "still here")], "companies")
            .await?;

        let broken = Indexer::new(
            FailingEmbedder,
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );
        let result = broken.build_index(&[company("New", "lost")], "companies").await;
        assert!(matches!(result, Err(IndexError::Embedding(_))));

        let handle = healthy.open("companies").await?;
        assert_eq!(handle.chunk_count(), 1);
        assert_eq!(handle.companies().await?[0].name, "Kept");
        Ok(())
    }

    #[tokio::test]
    async fn opening_a_missing_collection_fails() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let indexer = Indexer::new(
            CharacterNgramEmbedder::default(),
            LocalStore::new(dir.path()),
            IndexingOptions::default(),
        );
        assert!(matches!(
            indexer.open("companies").await,
            Err(IndexError::MissingCollection(_))
        ));
        Ok(())
    }
}
