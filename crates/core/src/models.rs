use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
pub const DEFAULT_NUM_CHUNKS: usize = 5;

/// One stored span of page text, keyed by `(document_name, page_number, chunk_index)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentChunk {
    pub document_name: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub text_content: String,
    pub created_at: DateTime<Utc>,
}

/// Location of an uploaded object, after transport-specific decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub object_name: String,
    pub content_type: Option<String>,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_name: object_name.into(),
            content_type: None,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.object_name.to_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub num_chunks: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            num_chunks: DEFAULT_NUM_CHUNKS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Skipped,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageFailure {
    pub page_number: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document_name: String,
    pub status: IngestStatus,
    pub reason: Option<String>,
    pub checksum: Option<String>,
    pub pages_extracted: usize,
    pub chunks_written: usize,
    pub page_failures: Vec<PageFailure>,
}

impl IngestionReport {
    pub fn skipped(document_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            status: IngestStatus::Skipped,
            reason: Some(reason.into()),
            checksum: None,
            pages_extracted: 0,
            chunks_written: 0,
            page_failures: Vec::new(),
        }
    }

    pub fn failed(document_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Failed,
            ..Self::skipped(document_name, reason)
        }
    }

    /// Human-readable status line used by the HTTP and CLI surfaces.
    pub fn status_message(&self) -> &'static str {
        match self.status {
            IngestStatus::Skipped => "Skipped non-PDF file",
            IngestStatus::Processed => "PDF processed successfully",
            IngestStatus::Failed => "PDF processing failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FallbackReason {
    NoContext,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Generation,
}

pub const CONFIG_ERROR_MESSAGE: &str = "AI service is not configured. Please set GEMINI_API_KEY.";
pub const NO_CONTEXT_MESSAGE: &str = "I couldn't find relevant information in the documents to answer your question. Please try rephrasing or ask about something else.";
pub const GENERATION_FAILED_MESSAGE: &str = "An error occurred while generating the AI response.";

/// Result of one question, distinguishing a grounded answer from the fixed fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered(String),
    Fallback(FallbackReason),
    Failed(FailureKind),
}

impl AnswerOutcome {
    pub fn message(&self) -> &str {
        match self {
            AnswerOutcome::Answered(text) => text,
            AnswerOutcome::Fallback(FallbackReason::NoContext) => NO_CONTEXT_MESSAGE,
            AnswerOutcome::Failed(FailureKind::Config) => CONFIG_ERROR_MESSAGE,
            AnswerOutcome::Failed(FailureKind::Generation) => GENERATION_FAILED_MESSAGE,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            AnswerOutcome::Answered(text) => text,
            other => other.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_detection_is_case_insensitive() {
        assert!(ObjectRef::new("b", "reports/Q3.PDF").is_pdf());
        assert!(ObjectRef::new("b", "q3.pdf").is_pdf());
        assert!(!ObjectRef::new("b", "report.txt").is_pdf());
        assert!(!ObjectRef::new("b", "pdf").is_pdf());
    }

    #[test]
    fn outcome_messages_are_fixed() {
        assert_eq!(
            AnswerOutcome::Fallback(FallbackReason::NoContext).message(),
            NO_CONTEXT_MESSAGE
        );
        assert_eq!(
            AnswerOutcome::Failed(FailureKind::Config).into_message(),
            CONFIG_ERROR_MESSAGE
        );
        assert_eq!(
            AnswerOutcome::Answered("42".to_string()).into_message(),
            "42"
        );
    }
}
