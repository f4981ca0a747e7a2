//! Temporary on-disk report files.
//!
//! A [`ReportFile`] owns its path: the file is removed when the value is
//! dropped, whether the report was streamed to completion or some step
//! failed first.

use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

const FILE_PREFIX: &str = "plant_analysis_report";

#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    download_name: String,
}

impl ReportFile {
    /// Reserve a fresh file name under `dir`, creating the directory if
    /// needed. The file itself is written later by the renderer.
    pub async fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir).await?;

        let millis = Utc::now().timestamp_millis();
        // The uuid keeps requests landing in the same millisecond apart
        let path = dir.join(format!(
            "{}_{}_{}.pdf",
            FILE_PREFIX,
            millis,
            Uuid::new_v4().simple()
        ));

        Ok(Self {
            path,
            download_name: format!("{}_{}.pdf", FILE_PREFIX, millis),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name offered to the client in `Content-Disposition`.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Open the rendered file as a byte stream plus its length.
    ///
    /// The stream keeps this `ReportFile` alive, so the file is deleted once
    /// the response body has been fully sent or dropped.
    pub async fn into_stream(
        self,
    ) -> io::Result<(u64, impl Stream<Item = io::Result<Bytes>> + Send + 'static)> {
        let file = fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        let guard = self;
        let stream = ReaderStream::new(file).map(move |chunk| {
            let _owner = &guard;
            chunk
        });

        Ok((len, stream))
    }
}

impl Drop for ReportFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed report file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove report file"
            ),
        }
    }
}
