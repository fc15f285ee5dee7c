use crate::error::IngestError;
use crate::models::IngestionOptions;

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Soft cap on chunk length, in characters.
    pub chunk_size: usize,
    /// Characters carried from the end of one chunk into the next.
    pub overlap: usize,
}

impl ChunkingConfig {
    pub fn validate(self) -> Result<Self, IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        IngestionOptions::default().into()
    }
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.overlap,
        }
    }
}

/// Splits page text into word-aligned chunks, treating `chunk_size` as a soft
/// cap in characters.
///
/// Words are never split, so a long word can push a chunk past the cap. The
/// word that closes a chunk is always appended after the overlap seed, so a
/// chunk also overflows when seed and word together exceed the cap. When a chunk closes, the next one is seeded with the last
/// `overlap` characters of the closed buffer; the seed is not aligned to word
/// boundaries and may start mid-word.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();

        if buffer_chars + word_chars + 1 > config.chunk_size && !buffer.is_empty() {
            push_trimmed(&mut chunks, &buffer);
            buffer = overlap_seed(&buffer, config.overlap);
            buffer_chars = buffer.chars().count();
        }

        buffer.push_str(word);
        buffer.push(' ');
        buffer_chars += word_chars + 1;
    }

    push_trimmed(&mut chunks, &buffer);
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn overlap_seed(buffer: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let mut seed = tail_chars(buffer, overlap).to_string();
    seed.push(' ');
    seed
}

/// Last `count` characters of `text`, or all of it when shorter.
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    text.char_indices()
        .rev()
        .nth(count - 1)
        .map(|(offset, _)| &text[offset..])
        .unwrap_or(text)
}
