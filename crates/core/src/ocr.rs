// crates/core/src/ocr.rs
//! OCR invocation: the fixed engine policy, the engine seam, and the adapter
//! that runs an engine off the async scheduler with uniform error capture.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::error::{EngineError, OcrError};

/// Keep only the tail of engine stderr in error messages.
const MAX_STDERR_CHARS: usize = 800;

/// `--fast-web-view` takes a size threshold in MB above which the output is
/// linearized. Nothing we accept comes close, so linearization never runs.
const NO_LINEARIZE_THRESHOLD_MB: &str = "999999";

/// Recognition options applied to every document.
///
/// Only the language is chosen per request; everything else is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPolicy {
    pub language: String,
}

impl OcrPolicy {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// Command-line flags for `ocrmypdf`, without the input/output paths.
    pub fn to_args(&self) -> Vec<String> {
        [
            "--language",
            self.language.as_str(),
            // Re-rasterize even if the PDF already carries a text layer.
            "--force-ocr",
            "--deskew",
            "--rotate-pages",
            "--clean",
            "--clean-final",
            "--optimize",
            "0",
            "--output-type",
            "pdfa-2",
            "--fast-web-view",
            NO_LINEARIZE_THRESHOLD_MB,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// One blocking engine run.
pub struct EngineRequest<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub policy: &'a OcrPolicy,
}

/// An external OCR engine.
///
/// `run` is blocking and is always called from the blocking thread pool.
pub trait OcrEngine: Send + Sync + 'static {
    fn run(&self, request: &EngineRequest<'_>) -> Result<(), EngineError>;
}

/// Engine backed by the `ocrmypdf` command-line tool.
#[derive(Debug, Clone)]
pub struct OcrMyPdf {
    program: PathBuf,
}

impl OcrMyPdf {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for OcrMyPdf {
    fn default() -> Self {
        Self::new("ocrmypdf")
    }
}

impl OcrEngine for OcrMyPdf {
    fn run(&self, request: &EngineRequest<'_>) -> Result<(), EngineError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(request.policy.to_args())
            .arg(request.input)
            .arg(request.output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            if !request.output.is_file() {
                return Err(EngineError::Rejected(format!(
                    "{program} exited cleanly but wrote no output"
                )));
            }
            return Ok(());
        }

        Err(EngineError::Exit {
            program,
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        })
    }
}

fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_STDERR_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - MAX_STDERR_CHARS).collect();
    format!("...{tail}")
}

/// Runs an [`OcrEngine`] for one document at a time, off the async
/// scheduler, turning every failure into an [`OcrError`].
#[derive(Clone)]
pub struct OcrAdapter {
    engine: Arc<dyn OcrEngine>,
    output_dir: PathBuf,
    permits: Option<Arc<Semaphore>>,
}

impl OcrAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            permits: None,
        }
    }

    /// Cap concurrent engine runs across all batches. `0` means unbounded.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.permits = (max_parallel > 0).then(|| Arc::new(Semaphore::new(max_parallel)));
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Recognize `content` and write the result to `<output_dir>/<output_target>`.
    pub async fn invoke(
        &self,
        content: Bytes,
        output_target: &str,
        language: &str,
    ) -> Result<Duration, OcrError> {
        let file = output_target.to_string();

        let _permit = match &self.permits {
            Some(permits) => Some(permits.clone().acquire_owned().await.map_err(|e| {
                OcrError::Worker {
                    file: file.clone(),
                    message: e.to_string(),
                }
            })?),
            None => None,
        };

        let engine = Arc::clone(&self.engine);
        let output = self.output_dir.join(output_target);
        let policy = OcrPolicy::new(language);
        let task_file = file.clone();

        tracing::debug!(file = %file, language, "starting OCR");
        let started = Instant::now();
        let joined = tokio::task::spawn_blocking(move || {
            run_engine(engine.as_ref(), &content, &output, &policy, &task_file)
        })
        .await;

        match joined {
            Ok(result) => result.map(|()| started.elapsed()),
            Err(e) => Err(OcrError::Worker {
                file,
                message: e.to_string(),
            }),
        }
    }
}

/// Spill `content` to a temporary file and hand it to the engine.
fn run_engine(
    engine: &dyn OcrEngine,
    content: &[u8],
    output: &Path,
    policy: &OcrPolicy,
    file: &str,
) -> Result<(), OcrError> {
    let io_err = |source| OcrError::Io {
        file: file.to_string(),
        source,
    };

    let mut input = tempfile::Builder::new()
        .prefix("ocr-input-")
        .suffix(".pdf")
        .tempfile()
        .map_err(io_err)?;
    input.write_all(content).map_err(io_err)?;
    input.flush().map_err(io_err)?;

    engine
        .run(&EngineRequest {
            input: input.path(),
            output,
            policy,
        })
        .map_err(|source| OcrError::Engine {
            file: file.to_string(),
            source,
        })
}
