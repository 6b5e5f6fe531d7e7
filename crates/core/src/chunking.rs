use crate::error::IndexError;
use crate::models::{CompanyRecord, IndexChunk, IndexingOptions};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl From<&IndexingOptions> for ChunkingConfig {
    fn from(value: &IndexingOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.max_chars == 0 {
            return Err(IndexError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IndexError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than max_chars {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Splits `text` into windows of at most `max_chars` characters. A window ends
/// after the last newline (or else space) in its second half when there is one.
/// With zero overlap the pieces concatenate back to `text`.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.max_chars {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let hard_end = (start + config.max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            soft_boundary(&chars, start + config.max_chars / 2, hard_end).unwrap_or(hard_end)
        };

        pieces.push(chars[start..end].iter().collect::<String>());
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(config.overlap_chars).max(start + 1);
    }

    pieces
}

fn soft_boundary(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let window = &chars[from..to];
    ['\n', ' ']
        .iter()
        .find_map(|separator| window.iter().rposition(|c| c == separator))
        .map(|position| from + position + 1)
}

/// Serializes every record and splits it into chunks carrying the record's
/// metadata. Chunk ids are scoped to `collection`.
pub fn build_chunks(
    records: &[CompanyRecord],
    collection: &str,
    options: &IndexingOptions,
) -> Result<Vec<IndexChunk>, IndexError> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let mut chunks = Vec::new();
    for (record_index, record) in records.iter().enumerate() {
        let metadata = record.metadata();
        for (chunk_index, text) in split_text(&record.document_text(), config)
            .into_iter()
            .enumerate()
        {
            chunks.push(IndexChunk {
                chunk_id: make_chunk_id(collection, record_index, chunk_index, &text),
                record_index,
                chunk_index,
                text,
                metadata: metadata.clone(),
            });
        }
    }

    Ok(chunks)
}

fn make_chunk_id(collection: &str, record_index: usize, chunk_index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update((record_index as u64).to_le_bytes());
    hasher.update((chunk_index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
