// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an OCR engine for a single run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", describe_exit(*.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("engine rejected the document: {0}")]
    Rejected(String),
}

/// Errors that can occur while recognizing one document.
///
/// Always carries the output basename so the failure can be reported
/// against the right file without aborting the rest of the batch.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR failed for {file}: {source}")]
    Engine {
        file: String,
        #[source]
        source: EngineError,
    },

    #[error("IO error preparing {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR worker for {file} stopped unexpectedly: {message}")]
    Worker { file: String, message: String },
}

impl OcrError {
    /// Basename of the output this failure belongs to.
    pub fn file(&self) -> &str {
        match self {
            OcrError::Engine { file, .. }
            | OcrError::Io { file, .. }
            | OcrError::Worker { file, .. } => file,
        }
    }
}

/// Errors that can occur when reading the output store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid output name: {name}")]
    InvalidName { name: String },

    #[error("Output not found: {name}")]
    NotFound { name: String },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build archive: {0}")]
    Archive(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Human-readable meaning of an `ocrmypdf` exit status.
fn describe_exit(code: Option<i32>) -> String {
    let Some(code) = code else {
        return "no exit status (terminated by signal)".to_string();
    };
    let meaning = match code {
        1 => "bad arguments",
        2 => "input file is not a usable PDF",
        3 => "missing dependency",
        4 => "invalid output PDF",
        5 => "file access error",
        6 => "page already has text",
        7 => "child process error",
        8 => "encrypted PDF",
        9 => "invalid configuration",
        10 => "PDF/A conversion failed",
        130 => "interrupted",
        _ => "other error",
    };
    format!("status {code} ({meaning})")
}
