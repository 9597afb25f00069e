//! Uploaded files spooled to disk.

use std::fmt::Display;
use std::path::Path;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::{Result, ShelfError};

/// One file of a multipart request, spooled into a temp file.
///
/// The temp file is removed when the value is dropped, so every exit path
/// of the pipeline (accepted, skipped, failed, rejected by quota) cleans
/// up without extra bookkeeping.
#[derive(Debug)]
pub struct UploadedFile {
    filename: String,
    content_type: String,
    size: i64,
    temp: NamedTempFile,
    writer: Option<tokio::fs::File>,
}

impl UploadedFile {
    /// Create an empty spool file in `temp_dir` (system temp dir if None).
    pub fn create(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        temp_dir: Option<&Path>,
    ) -> Result<Self> {
        let temp = match temp_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                NamedTempFile::new_in(dir)?
            }
            None => NamedTempFile::new()?,
        };
        let writer = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        Ok(Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: 0,
            temp,
            writer: Some(writer),
        })
    }

    /// Spool an in-memory buffer.
    pub async fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: &[u8],
        temp_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut file = Self::create(filename, content_type, temp_dir)?;
        file.append(data).await?;
        file.finish().await?;
        Ok(file)
    }

    /// Append a chunk of the request body.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(chunk).await?;
            self.size += chunk.len() as i64;
        }
        Ok(())
    }

    /// Flush and close the writer. Further appends are ignored.
    pub async fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
        }
        Ok(())
    }

    /// Read the spooled content.
    pub async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(self.temp.path()).await?))
    }

    /// Original filename as sent by the client.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Declared mimetype.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Bytes received.
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Location of the spool file.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Spool a streamed request part chunk by chunk.
///
/// Read errors of the stream are client errors and surface as
/// [`ShelfError::Validation`]; the partial spool file is dropped with it.
pub async fn spool_field<S, E>(
    filename: impl Into<String>,
    content_type: impl Into<String>,
    temp_dir: Option<&Path>,
    stream: S,
) -> Result<UploadedFile>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    let mut file = UploadedFile::create(filename, content_type, temp_dir)?;
    let mut stream = std::pin::pin!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            ShelfError::Validation(format!("failed to read uploaded file: {e}"))
        })?;
        file.append(&chunk).await?;
    }
    file.finish().await?;
    Ok(file)
}
