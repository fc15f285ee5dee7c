use crate::error::IngestError;
use crate::models::ObjectRef;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncRead;

pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// Fetches a named object from a bucket as a byte stream.
#[async_trait]
pub trait ObjectSource {
    async fn open(&self, object: &ObjectRef) -> Result<ObjectStream, IngestError>;
}

/// Buckets are directories under `root`; object names are relative paths inside them.
#[derive(Debug, Clone)]
pub struct LocalBucketSource {
    root: PathBuf,
}

impl LocalBucketSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, IngestError> {
        Ok(self.root.join(safe_relative(bucket)?))
    }

    pub fn object_path(&self, object: &ObjectRef) -> Result<PathBuf, IngestError> {
        Ok(self
            .bucket_dir(&object.bucket)?
            .join(safe_relative(&object.object_name)?))
    }
}

#[async_trait]
impl ObjectSource for LocalBucketSource {
    async fn open(&self, object: &ObjectRef) -> Result<ObjectStream, IngestError> {
        let path = self.object_path(object)?;
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(
                IngestError::ObjectNotFound(format!("{}/{}", object.bucket, object.object_name)),
            ),
            Err(error) => Err(IngestError::Io(error)),
        }
    }
}

fn safe_relative(name: &str) -> Result<&Path, IngestError> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if name.is_empty() || escapes {
        return Err(IngestError::InvalidTrigger(format!(
            "object path must be relative and stay inside its bucket: {name}"
        )));
    }
    Ok(path)
}
