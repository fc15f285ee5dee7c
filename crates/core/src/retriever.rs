use crate::models::RetrievalOptions;
use crate::store::ChunkStore;
use std::sync::Arc;
use tracing::{error, info};

/// Bounded keyword retrieval that never fails the caller.
pub struct Retriever<S> {
    store: Arc<S>,
    options: RetrievalOptions,
}

impl<S> Retriever<S>
where
    S: ChunkStore + Send + Sync,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_options(store, RetrievalOptions::default())
    }

    pub fn with_options(store: Arc<S>, options: RetrievalOptions) -> Self {
        Self { store, options }
    }

    /// Retrieves with the configured default limit.
    pub async fn retrieve_default(&self, query: &str) -> Vec<String> {
        self.retrieve(query, self.options.num_chunks).await
    }

    /// Returns at most `num_chunks` matching chunk texts. Store failures are
    /// logged and yield an empty result.
    pub async fn retrieve(&self, query: &str, num_chunks: usize) -> Vec<String> {
        match self.store.search(query, num_chunks).await {
            Ok(mut chunks) => {
                chunks.truncate(num_chunks);
                info!(query, retrieved = chunks.len(), "retrieved relevant chunks");
                chunks
            }
            Err(err) => {
                error!(query, error = %err, "error retrieving chunks");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use async_trait::async_trait;

    struct FakeStore {
        hits: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl ChunkStore for FakeStore {
        async fn upsert_chunks(
            &self,
            _document_name: &str,
            _page_number: u32,
            chunks: &[String],
        ) -> Result<usize, StoreError> {
            Ok(chunks.len())
        }

        async fn search(&self, _query_text: &str, _limit: usize) -> Result<Vec<String>, StoreError> {
            if self.fail {
                return Err(StoreError::CorruptRow("store offline".to_string()));
            }
            // Returns every hit regardless of limit.
            Ok(self.hits.clone())
        }
    }

    #[tokio::test]
    async fn result_count_is_bounded() {
        let store = FakeStore {
            hits: (0..20).map(|index| format!("chunk {index}")).collect(),
            fail: false,
        };
        let retriever = Retriever::new(Arc::new(store));

        assert_eq!(retriever.retrieve("anything", 3).await.len(), 3);
        assert_eq!(retriever.retrieve_default("anything").await.len(), 5);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        let retriever = Retriever::new(Arc::new(FakeStore {
            hits: Vec::new(),
            fail: true,
        }));

        assert!(retriever.retrieve("revenue", 5).await.is_empty());
    }
}
