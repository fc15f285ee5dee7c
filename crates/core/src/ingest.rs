use crate::chunking::{chunk_text, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::{extract_from_stream, Extraction, LopdfExtractor, PdfExtractor};
use crate::models::{IngestStatus, IngestionOptions, IngestionReport, ObjectRef, PageFailure};
use crate::objects::{LocalBucketSource, ObjectSource};
use crate::store::ChunkStore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Runs one object through extraction, chunking and storage.
pub struct Ingestor<O, S, E = LopdfExtractor> {
    objects: Arc<O>,
    store: Arc<S>,
    extractor: Arc<E>,
    chunking: ChunkingConfig,
}

impl<O, S> Ingestor<O, S, LopdfExtractor>
where
    O: ObjectSource + Send + Sync,
    S: ChunkStore + Send + Sync,
{
    pub fn new(
        objects: Arc<O>,
        store: Arc<S>,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        Self::with_extractor(objects, store, Arc::new(LopdfExtractor), options)
    }
}

impl<O, S, E> Ingestor<O, S, E>
where
    O: ObjectSource + Send + Sync,
    S: ChunkStore + Send + Sync,
    E: PdfExtractor + Send + Sync + 'static,
{
    pub fn with_extractor(
        objects: Arc<O>,
        store: Arc<S>,
        extractor: Arc<E>,
        options: IngestionOptions,
    ) -> Result<Self, IngestError> {
        let chunking = ChunkingConfig::from(options).validate()?;
        Ok(Self {
            objects,
            store,
            extractor,
            chunking,
        })
    }

    /// Ingests one object. Non-PDF names are skipped, an unreadable document
    /// yields a `Failed` report with zero pages, and a page whose chunks cannot
    /// be stored is recorded without stopping the remaining pages.
    pub async fn ingest(&self, object: &ObjectRef) -> IngestionReport {
        let document_name = object.object_name.as_str();

        if !object.is_pdf() {
            info!(document = document_name, "skipping non-PDF file");
            return IngestionReport::skipped(document_name, "not a pdf");
        }

        info!(bucket = %object.bucket, document = document_name, "processing pdf");

        let stream = match self.objects.open(object).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(document = document_name, error = %err, "error fetching pdf");
                return IngestionReport::failed(document_name, err.to_string());
            }
        };

        let mut hashing = HashingReader::new(stream);
        let extraction = extract_from_stream(self.extractor.clone(), &mut hashing).await;
        let checksum = hashing.finish();

        let Extraction {
            pages,
            page_failures,
        } = match extraction {
            Ok(extraction) => extraction,
            Err(err) => {
                error!(document = document_name, error = %err, "error processing pdf");
                let mut report = IngestionReport::failed(document_name, err.to_string());
                report.checksum = Some(checksum);
                return report;
            }
        };

        info!(
            document = document_name,
            pages = pages.len(),
            "extracted text from pages"
        );

        let mut report = IngestionReport {
            document_name: document_name.to_string(),
            status: IngestStatus::Processed,
            reason: None,
            checksum: Some(checksum),
            pages_extracted: pages.len(),
            chunks_written: 0,
            page_failures,
        };

        for page in pages {
            let chunks = chunk_text(&page.text, self.chunking);
            match self
                .store
                .upsert_chunks(document_name, page.number, &chunks)
                .await
            {
                Ok(written) => {
                    info!(
                        document = document_name,
                        page = page.number,
                        chunks = written,
                        "stored chunks"
                    );
                    report.chunks_written += written;
                }
                Err(err) => {
                    error!(
                        document = document_name,
                        page = page.number,
                        error = %err,
                        "error inserting chunks"
                    );
                    report.page_failures.push(PageFailure {
                        page_number: page.number,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report
    }
}

impl<S, E> Ingestor<LocalBucketSource, S, E>
where
    S: ChunkStore + Send + Sync,
    E: PdfExtractor + Send + Sync + 'static,
{
    /// Ingests every PDF found recursively under a bucket directory, one
    /// document at a time. Failures are reported per document.
    pub async fn ingest_bucket(&self, bucket: &str) -> Result<Vec<IngestionReport>, IngestError> {
        let bucket_dir = self.objects.bucket_dir(bucket)?;
        let files = discover_pdf_files(&bucket_dir);

        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                bucket_dir.display()
            )));
        }

        let mut reports = Vec::with_capacity(files.len());
        for path in files {
            let Some(object_name) = relative_object_name(&bucket_dir, &path) else {
                warn!(path = %path.display(), "skipping file with non-utf8 path");
                continue;
            };
            let report = self.ingest(&ObjectRef::new(bucket, object_name)).await;
            reports.push(report);
        }

        Ok(reports)
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn relative_object_name(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Passes bytes through while computing their SHA-256 digest.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let polled = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &polled {
            let fresh = &buf.filled()[before..];
            self.hasher.update(fresh);
        }
        polled
    }
}
