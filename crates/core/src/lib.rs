pub mod answer;
pub mod chunking;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod ingest;
pub mod models;
pub mod objects;
pub mod orchestrator;
pub mod retriever;
pub mod store;
pub mod stores;
pub mod trigger;

pub use answer::{build_prompt, AnswerAssembler, AnswerModel};
pub use chunking::{chunk_text, ChunkingConfig};
pub use error::{GenerationError, IngestError, QueryError, StoreError};
pub use extractor::{extract_from_stream, Extraction, LopdfExtractor, PageText, PdfExtractor};
pub use gemini::{GeminiConfig, GeminiModel, DEFAULT_GEMINI_MODEL};
pub use ingest::{discover_pdf_files, Ingestor};
pub use models::{
    AnswerOutcome, DocumentChunk, FailureKind, FallbackReason, IngestStatus, IngestionOptions,
    IngestionReport, ObjectRef, PageFailure, RetrievalOptions,
};
pub use objects::{LocalBucketSource, ObjectSource, ObjectStream};
pub use orchestrator::{QueryState, QueryTrace, QuestionAnswerer};
pub use retriever::Retriever;
pub use store::ChunkStore;
pub use stores::SqliteChunkStore;
pub use trigger::{normalize_trigger, IngestTrigger};
