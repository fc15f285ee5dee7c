use crate::error::IngestError;
use crate::models::PageFailure;
use lopdf::Document;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Pages that yielded text, in page order, plus the pages that failed.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub pages: Vec<PageText>,
    pub page_failures: Vec<PageFailure>,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Extraction, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Extraction, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::Extraction(error.to_string()))?;

        let mut extraction = Extraction::default();
        for (page_no, _page_id) in document.get_pages() {
            match document.extract_text(&[page_no]) {
                Ok(text) if text.trim().is_empty() => {
                    debug!(page = page_no, "page has no text, omitting");
                }
                Ok(text) => extraction.pages.push(PageText {
                    number: page_no,
                    text,
                }),
                Err(error) => {
                    let failure = IngestError::PageExtraction {
                        page: page_no,
                        details: error.to_string(),
                    };
                    warn!(path = %path.display(), error = %failure, "skipping page");
                    extraction.page_failures.push(PageFailure {
                        page_number: page_no,
                        reason: failure.to_string(),
                    });
                }
            }
        }

        Ok(extraction)
    }
}

/// Spools `stream` into a temporary file and runs `extractor` over it.
///
/// The temporary file is removed when this returns, on success and on every
/// failure path, including a panic inside the extractor.
pub async fn extract_from_stream<E, R>(
    extractor: Arc<E>,
    mut stream: R,
) -> Result<Extraction, IngestError>
where
    E: PdfExtractor + Send + Sync + 'static,
    R: AsyncRead + Unpin,
{
    let spool = tempfile::Builder::new()
        .prefix("pdf-qa-")
        .suffix(".pdf")
        .tempfile()?;

    let mut file = tokio::fs::File::from_std(spool.reopen()?);
    let copied = tokio::io::copy(&mut stream, &mut file).await?;
    file.flush().await?;
    drop(file);
    debug!(bytes = copied, path = %spool.path().display(), "spooled pdf");

    tokio::task::spawn_blocking(move || extractor.extract_pages(spool.path()))
        .await
        .map_err(|error| IngestError::Extraction(format!("extraction task aborted: {error}")))?
}
