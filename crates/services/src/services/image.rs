use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

const STAGING_PREFIX: &str = ".incoming-";
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Image not found")]
    NotFound,
    #[error("Upload stream failed: {0}")]
    Stream(String),
}

/// An upload written under a temporary name, waiting for the owning pod's id.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    extension: Option<String>,
    size_bytes: u64,
}

impl StagedUpload {
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// A stored file opened for reading.
#[derive(Debug)]
pub struct StoredImage {
    pub file: fs::File,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Owns the upload directory: names, writes and reads image files.
#[derive(Debug, Clone)]
pub struct ImageService {
    upload_dir: PathBuf,
}

impl ImageService {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Result<Self, ImageError> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self { upload_dir })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// `{pod_id}_{32 hex chars}{.ext}`, where the extension comes from the
    /// client's file name after [`sanitize_extension`].
    pub fn generate_filename(pod_id: i64, original_name: Option<&str>) -> String {
        let extension = original_name.and_then(sanitize_extension);
        Self::filename_with_extension(pod_id, extension.as_deref())
    }

    fn filename_with_extension(pod_id: i64, extension: Option<&str>) -> String {
        format!(
            "{pod_id}_{}{}",
            Uuid::new_v4().simple(),
            extension.map(|ext| format!(".{ext}")).unwrap_or_default()
        )
    }

    /// Streams an upload straight to its final name for an existing pod.
    /// Returns the generated file name.
    pub async fn store_stream<S, E>(
        &self,
        pod_id: i64,
        original_name: Option<&str>,
        stream: S,
    ) -> Result<String, ImageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let filename = Self::generate_filename(pod_id, original_name);
        let path = self.upload_dir.join(&filename);
        let size_bytes = write_stream(&path, stream).await?;
        tracing::debug!(pod_id, %filename, size_bytes, "Stored image upload");
        Ok(filename)
    }

    /// Streams an upload to a staging file. Use [`ImageService::claim`] once
    /// the owning pod exists, or [`ImageService::discard`] to drop it.
    pub async fn stage_stream<S, E>(
        &self,
        original_name: Option<&str>,
        stream: S,
    ) -> Result<StagedUpload, ImageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let path = self
            .upload_dir
            .join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()));
        let size_bytes = write_stream(&path, stream).await?;
        Ok(StagedUpload {
            path,
            extension: original_name.and_then(sanitize_extension),
            size_bytes,
        })
    }

    /// Moves a staged upload to its final `{pod_id}_...` name.
    pub async fn claim(&self, staged: StagedUpload, pod_id: i64) -> Result<String, ImageError> {
        let filename = Self::filename_with_extension(pod_id, staged.extension.as_deref());
        let destination = self.upload_dir.join(&filename);
        if let Err(err) = fs::rename(&staged.path, &destination).await {
            remove_quietly(&staged.path).await;
            return Err(err.into());
        }
        tracing::debug!(
            pod_id,
            %filename,
            size_bytes = staged.size_bytes,
            "Stored image upload"
        );
        Ok(filename)
    }

    pub async fn discard(&self, staged: StagedUpload) {
        remove_quietly(&staged.path).await;
    }

    /// Best-effort removal of a stored file, used when a request fails after
    /// its upload was written.
    pub async fn remove(&self, filename: &str) {
        if let Ok(path) = self.resolve(filename) {
            remove_quietly(&path).await;
        }
    }

    /// Opens a stored file by name. Anything that is not a plain file name
    /// inside the upload directory is reported as not found.
    pub async fn open(&self, filename: &str) -> Result<StoredImage, ImageError> {
        let path = self.resolve(filename)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ImageError::NotFound);
            }
            Err(err) => return Err(err.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ImageError::NotFound);
        }

        Ok(StoredImage {
            file,
            content_type: mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string(),
            size_bytes: metadata.len(),
        })
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, ImageError> {
        let is_plain_name = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.starts_with(STAGING_PREFIX)
            && !filename.contains(['/', '\\', '\0']);
        if !is_plain_name {
            return Err(ImageError::NotFound);
        }
        Ok(self.upload_dir.join(filename))
    }
}

/// Lowercased extension of a client-supplied file name, or `None` when it is
/// missing or contains anything other than ASCII letters and digits.
pub fn sanitize_extension(original_name: &str) -> Option<String> {
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = base.rsplit_once('.')?;
    if stem.is_empty()
        || extension.is_empty()
        || extension.len() > MAX_EXTENSION_LEN
        || !extension.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

async fn write_stream<S, E>(path: &Path, stream: S) -> Result<u64, ImageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let result = copy_to_file(path, stream).await;
    if result.is_err() {
        remove_quietly(path).await;
    }
    result
}

async fn copy_to_file<S, E>(path: &Path, stream: S) -> Result<u64, ImageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut file = fs::File::create(path).await?;
    let mut written = 0u64;

    tokio::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| ImageError::Stream(err.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!("Failed to remove {}: {}", path.display(), err),
    }
}
