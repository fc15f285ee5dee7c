use crate::error::StoreError;
use async_trait::async_trait;

/// Durable chunk storage keyed by `(document_name, page_number, chunk_index)`.
#[async_trait]
pub trait ChunkStore {
    /// Writes `chunks` at their ordinal positions for one page, in a single
    /// transaction. Existing keys are overwritten and their timestamp
    /// refreshed. Returns the number of rows written.
    async fn upsert_chunks(
        &self,
        document_name: &str,
        page_number: u32,
        chunks: &[String],
    ) -> Result<usize, StoreError>;

    /// Returns up to `limit` chunk texts matching any whitespace-separated
    /// term of `query_text`, best match first.
    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// Splits a query into search terms on whitespace.
pub fn query_terms(query_text: &str) -> Vec<&str> {
    query_text.split_whitespace().collect()
}
