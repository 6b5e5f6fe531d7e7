use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

pub const DEFAULT_COLLECTION_NAME: &str = "imda_accred_companies";
pub const DEFAULT_LISTING_URL: &str =
    "https://www.imda.gov.sg/resources/innovative-tech-companies-directory";

/// One company as parsed from its detail page. Every field other than
/// `description` and `tags` may be absent; absence is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub contact_person: Option<String>,
    pub contact_number: Option<String>,
    pub contact_email: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: String,
    pub tags: Vec<String>,
    pub source_url: Option<String>,
    pub page: Option<u32>,
}

impl CompanyRecord {
    pub fn document_text(&self) -> String {
        format!(
            "Company: {}\nWebsite: {}\nDescription: {}\nCategory: {}\nSubcategory: {}\nTags: {}",
            or_empty(&self.name),
            or_empty(&self.website_url),
            self.description,
            or_empty(&self.category),
            or_empty(&self.subcategory),
            self.tags.join(", "),
        )
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: or_empty(&self.source_url).to_string(),
            name: or_empty(&self.name).to_string(),
            category: or_empty(&self.category).to_string(),
            subcategory: or_empty(&self.subcategory).to_string(),
            contact: or_empty(&self.contact_person).to_string(),
            website: or_empty(&self.website_url).to_string(),
            page: self.page.map(|page| page.to_string()).unwrap_or_default(),
            tags: self.tags.join(", "),
        }
    }
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

/// Provenance copied onto every chunk of a record. All keys are always present;
/// a missing source value is stored as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub contact: String,
    pub website: String,
    pub page: String,
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChunk {
    pub chunk_id: String,
    pub record_index: usize,
    pub chunk_index: usize,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub number: u32,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub fn single() -> Self {
        Self { first: 1, last: 1 }
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.first..=self.last
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self::single()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Collected { url: String, page: u32 },
    Skipped { url: String, page: u32, reason: String },
}

impl ItemOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, ItemOutcome::Skipped { .. })
    }
}

/// Result of one collection run. `records` is in page order, then in-page order.
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub range: PageRange,
    pub records: Vec<CompanyRecord>,
    pub outcomes: Vec<ItemOutcome>,
}

impl CollectionReport {
    pub fn skipped(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_skipped())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    pub fetch_timeout: Duration,
    pub render_wait: Duration,
    pub poll_interval: Duration,
    pub pagination_selector: &'static str,
    pub pagination_link_selector: &'static str,
    pub listing_item_selector: &'static str,
    pub page_query_param: &'static str,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            render_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            pagination_selector: ".pagination.innovative-tech-listing__pagination",
            pagination_link_selector: ".pagination__list li a",
            listing_item_selector: "a.teaser-card__link",
            page_query_param: "page",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 10_000,
            chunk_overlap_chars: 0,
        }
    }
}
