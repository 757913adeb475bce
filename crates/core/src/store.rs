// crates/core/src/store.rs
//! The output directory: lookup, listing, and on-demand zip archives.

use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::naming::is_safe_output_name;

/// Filename offered for the bulk download.
pub const ARCHIVE_NAME: &str = "ocr_results.zip";

/// One produced document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutputEntry {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

/// Directory holding processed documents.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))
    }

    /// Path of an existing output, validated against traversal.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_output_name(name) {
            return Err(StoreError::InvalidName {
                name: name.to_string(),
            });
        }
        let path = self.dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Open an output for streaming. Returns the file and its length.
    pub async fn open(&self, name: &str) -> Result<(tokio::fs::File, u64), StoreError> {
        let path = self.resolve(name).await?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| StoreError::io(&path, e))?
            .len();
        Ok((file, len))
    }

    /// All produced PDFs, most recently modified first.
    pub async fn list(&self) -> Result<Vec<OutputEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_pdf(&name) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Skipping unreadable output");
                    continue;
                }
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(OutputEntry {
                name,
                size_bytes: meta.len(),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }

        entries.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    /// Zip every PDF currently in the directory.
    ///
    /// Built fresh on each call into an unnamed temporary file, positioned at
    /// the start, so the archive never sits in memory. Nothing is written back
    /// to the store. Returns the file and its length.
    pub async fn archive(&self) -> Result<(tokio::fs::File, u64), StoreError> {
        let mut names: Vec<String> = self.list().await?.into_iter().map(|e| e.name).collect();
        names.sort();

        let dir = self.dir.clone();
        let (file, len) = tokio::task::spawn_blocking(move || build_archive(&dir, &names))
            .await
            .map_err(|e| StoreError::Archive(e.to_string()))??;
        Ok((tokio::fs::File::from_std(file), len))
    }
}

fn is_pdf(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn build_archive(dir: &Path, names: &[String]) -> Result<(std::fs::File, u64), StoreError> {
    let spool = tempfile::tempfile().map_err(|e| StoreError::io(std::env::temp_dir(), e))?;
    let mut writer = zip::ZipWriter::new(spool);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for name in names {
        let path = dir.join(name);
        let mut input = match std::fs::File::open(&path) {
            Ok(input) => input,
            // Removed between listing and reading.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StoreError::io(path, e)),
        };
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| StoreError::Archive(e.to_string()))?;
        std::io::copy(&mut input, &mut writer).map_err(|e| StoreError::io(&path, e))?;
    }

    let mut spool = writer
        .finish()
        .map_err(|e| StoreError::Archive(e.to_string()))?;
    let len = spool
        .seek(SeekFrom::End(0))
        .and_then(|len| spool.rewind().map(|()| len))
        .map_err(|e| StoreError::io(std::env::temp_dir(), e))?;
    Ok((spool, len))
}
