pub mod browser;
pub mod chunking;
pub mod collection;
pub mod collector;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod indexer;
pub mod models;
pub mod stores;
pub mod traits;

pub use browser::{HttpFetcher, WebDriverRenderer};
pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use collection::{filter_companies, list_companies, CollectionHandle, DEFAULT_TOP_K};
pub use collector::Collector;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
pub use error::{CollectError, HistoryError, IndexError};
pub use extractor::{extract_company_details, extract_detail_urls, parse_page_range};
pub use history::{QueryHistory, QueryRecord};
pub use indexer::Indexer;
pub use models::{
    ChunkMetadata, CollectionReport, CollectorOptions, CompanyRecord, IndexChunk, IndexingOptions,
    ItemOutcome, ListingPage, PageRange, SearchHit, DEFAULT_COLLECTION_NAME, DEFAULT_LISTING_URL,
};
pub use stores::{LocalStore, QdrantStore};
pub use traits::{PageFetcher, PageRenderer, VectorStore};
