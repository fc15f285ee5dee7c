//! SQLite-backed [`ChunkStore`].
//!
//! Rows live in `document_chunks`, unique on
//! `(document_name, page_number, chunk_index)`. An external-content FTS5
//! table, `document_chunks_fts`, mirrors `text_content` through triggers so
//! upserts keep the keyword index in step with the rows.

use crate::error::StoreError;
use crate::models::DocumentChunk;
use crate::store::{query_terms, ChunkStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Connection)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StoreError::Connection)?;

        Ok(Self { pool })
    }

    /// A private in-memory database. The pool is pinned to one connection,
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(StoreError::Connection)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StoreError::Connection)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Creates the table, indexes, keyword index and sync triggers. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_name TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                chunk_index INTEGER NOT NULL,
                text_content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_doc_page_chunk \
             ON document_chunks (document_name, page_number, chunk_index)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_document_name ON document_chunks (document_name)",
        )
        .execute(&self.pool)
        .await?;

        // FTS5 virtual tables are checked explicitly before creation.
        let fts_exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'document_chunks_fts'",
        )
        .fetch_one(&self.pool)
        .await?;

        if !fts_exists {
            sqlx::query(
                r#"
                CREATE VIRTUAL TABLE document_chunks_fts USING fts5(
                    text_content,
                    content = 'document_chunks',
                    content_rowid = 'id',
                    tokenize = 'porter unicode61'
                )
                "#,
            )
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS document_chunks_ai AFTER INSERT ON document_chunks BEGIN
                INSERT INTO document_chunks_fts (rowid, text_content) VALUES (new.id, new.text_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS document_chunks_ad AFTER DELETE ON document_chunks BEGIN
                INSERT INTO document_chunks_fts (document_chunks_fts, rowid, text_content)
                VALUES ('delete', old.id, old.text_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TRIGGER IF NOT EXISTS document_chunks_au AFTER UPDATE ON document_chunks BEGIN
                INSERT INTO document_chunks_fts (document_chunks_fts, rowid, text_content)
                VALUES ('delete', old.id, old.text_content);
                INSERT INTO document_chunks_fts (rowid, text_content) VALUES (new.id, new.text_content);
            END
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("table 'document_chunks' checked/created");
        Ok(())
    }

    /// All stored chunks of one document, ordered by page then chunk index.
    pub async fn document_chunks(
        &self,
        document_name: &str,
    ) -> Result<Vec<DocumentChunk>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT document_name, page_number, chunk_index, text_content, created_at
            FROM document_chunks
            WHERE document_name = ?
            ORDER BY page_number, chunk_index
            "#,
        )
        .bind(document_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DocumentChunk, StoreError> {
                let page_number: i64 = row.try_get("page_number")?;
                let chunk_index: i64 = row.try_get("chunk_index")?;
                Ok(DocumentChunk {
                    document_name: row.try_get("document_name")?,
                    page_number: to_u32(page_number, "page_number")?,
                    chunk_index: to_u32(chunk_index, "chunk_index")?,
                    text_content: row.try_get("text_content")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn upsert_chunks(
        &self,
        document_name: &str,
        page_number: u32,
        chunks: &[String],
    ) -> Result<usize, StoreError> {
        let write_error = |source: sqlx::Error| StoreError::Write {
            document_name: document_name.to_string(),
            page_number,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(StoreError::Connection)?;
        let now = Utc::now();

        for (chunk_index, text) in chunks.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO document_chunks (document_name, page_number, chunk_index, text_content, created_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (document_name, page_number, chunk_index) DO UPDATE SET
                    text_content = excluded.text_content,
                    created_at = excluded.created_at
                "#,
            )
            .bind(document_name)
            .bind(i64::from(page_number))
            .bind(chunk_index as i64)
            .bind(text)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(write_error)?;
        }

        tx.commit().await.map_err(write_error)?;
        debug!(
            document = document_name,
            page = page_number,
            chunks = chunks.len(),
            "upserted chunks"
        );
        Ok(chunks.len())
    }

    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let Some(match_expression) = fts_or_expression(query_text) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let texts = sqlx::query_scalar::<_, String>(
            r#"
            SELECT c.text_content
            FROM document_chunks_fts
            JOIN document_chunks c ON c.id = document_chunks_fts.rowid
            WHERE document_chunks_fts MATCH ?
            ORDER BY document_chunks_fts.rank
            LIMIT ?
            "#,
        )
        .bind(&match_expression)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        debug!(query = %match_expression, hits = texts.len(), "keyword search");
        Ok(texts)
    }
}

/// Builds an FTS5 expression matching any query term. Each term is quoted as
/// a phrase so user punctuation cannot change the query syntax. Terms without
/// a letter or digit are dropped, since they carry no tokens.
fn fts_or_expression(query_text: &str) -> Option<String> {
    let phrases: Vec<String> = query_terms(query_text)
        .into_iter()
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" OR "))
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRow(format!("{column} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn migrated_store() -> SqliteChunkStore {
        let store = SqliteChunkStore::in_memory()
            .await
            .expect("in-memory store should open");
        store.migrate().await.expect("migration should succeed");
        store
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn without_timestamps(rows: &[DocumentChunk]) -> Vec<(String, u32, u32, String)> {
        rows.iter()
            .map(|row| {
                (
                    row.document_name.clone(),
                    row.page_number,
                    row.chunk_index,
                    row.text_content.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn or_expression_quotes_terms() {
        assert_eq!(
            fts_or_expression("revenue growth").as_deref(),
            Some("\"revenue\" OR \"growth\"")
        );
        assert_eq!(
            fts_or_expression("say \"hi\"").as_deref(),
            Some("\"say\" OR \"\"\"hi\"\"\"")
        );
        assert_eq!(fts_or_expression("  ? !! "), None);
    }

    #[tokio::test]
    async fn migration_is_idempotent() {
        let store = migrated_store().await;
        store.migrate().await.expect("second migration should succeed");
        store
            .upsert_chunks("a.pdf", 1, &texts(&["still works"]))
            .await
            .expect("upsert after re-migration");
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_the_same_rows() {
        let store = migrated_store().await;
        let chunks = texts(&["alpha beta", "gamma delta", "epsilon"]);

        store.upsert_chunks("doc.pdf", 1, &chunks).await.expect("first upsert");
        let first = store.document_chunks("doc.pdf").await.expect("read rows");
        store.upsert_chunks("doc.pdf", 1, &chunks).await.expect("second upsert");
        let second = store.document_chunks("doc.pdf").await.expect("read rows");

        assert_eq!(first.len(), 3);
        assert_eq!(without_timestamps(&first), without_timestamps(&second));
        for (before, after) in first.iter().zip(&second) {
            assert!(after.created_at >= before.created_at);
        }
    }

    #[tokio::test]
    async fn writing_an_existing_key_overwrites_it() {
        let store = migrated_store().await;
        store
            .upsert_chunks("doc.pdf", 2, &texts(&["old text", "kept text"]))
            .await
            .expect("first upsert");
        store
            .upsert_chunks("doc.pdf", 2, &texts(&["new text"]))
            .await
            .expect("second upsert");

        let rows = store.document_chunks("doc.pdf").await.expect("read rows");
        assert_eq!(
            without_timestamps(&rows),
            vec![
                ("doc.pdf".to_string(), 2, 0, "new text".to_string()),
                ("doc.pdf".to_string(), 2, 1, "kept text".to_string()),
            ]
        );

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(store.pool())
            .await
            .expect("count rows");
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn keyword_index_follows_overwrites() {
        let store = migrated_store().await;
        store
            .upsert_chunks("doc.pdf", 1, &texts(&["turbine maintenance schedule"]))
            .await
            .expect("first upsert");
        store
            .upsert_chunks("doc.pdf", 1, &texts(&["quarterly revenue summary"]))
            .await
            .expect("second upsert");

        assert!(store.search("turbine", 5).await.expect("search").is_empty());
        assert_eq!(
            store.search("revenue", 5).await.expect("search"),
            vec!["quarterly revenue summary".to_string()]
        );
    }

    #[tokio::test]
    async fn search_matches_any_term() {
        let store = migrated_store().await;
        store
            .upsert_chunks(
                "report.pdf",
                1,
                &texts(&[
                    "revenue growth increased 12%",
                    "the cafeteria menu changed on tuesday",
                    "operating margin held steady",
                ]),
            )
            .await
            .expect("upsert");

        let hits = store.search("revenue growth", 5).await.expect("search");
        assert_eq!(hits, vec!["revenue growth increased 12%".to_string()]);

        let either = store.search("margin cafeteria", 5).await.expect("search");
        assert_eq!(either.len(), 2);
    }

    #[tokio::test]
    async fn search_respects_limit_and_empty_cases() {
        let store = migrated_store().await;
        let chunks: Vec<String> = (0..10).map(|index| format!("pump inspection {index}")).collect();
        store.upsert_chunks("manual.pdf", 1, &chunks).await.expect("upsert");

        assert_eq!(store.search("pump", 3).await.expect("search").len(), 3);
        assert!(store.search("pump", 0).await.expect("search").is_empty());
        assert!(store.search("zeppelin", 5).await.expect("search").is_empty());
        assert!(store.search("   ", 5).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn failure_mid_batch_rolls_back_the_whole_page() {
        let store = migrated_store().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_marked_chunk BEFORE INSERT ON document_chunks
            WHEN new.text_content = 'rejected chunk'
            BEGIN
                SELECT RAISE(ABORT, 'rejected');
            END
            "#,
        )
        .execute(store.pool())
        .await
        .expect("create trigger");

        let result = store
            .upsert_chunks(
                "batch.pdf",
                3,
                &texts(&["first chunk", "rejected chunk", "third chunk"]),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Write { page_number: 3, .. })
        ));
        assert!(store.document_chunks("batch.pdf").await.expect("read rows").is_empty());
        assert!(store.search("first", 5).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn write_without_schema_is_a_write_error() {
        let store = SqliteChunkStore::in_memory().await.expect("open store");
        let result = store.upsert_chunks("doc.pdf", 4, &texts(&["text"])).await;

        match result {
            Err(StoreError::Write {
                document_name,
                page_number,
                ..
            }) => {
                assert_eq!(document_name, "doc.pdf");
                assert_eq!(page_number, 4);
            }
            other => panic!("expected write error, got {other:?}"),
        }
    }
}
