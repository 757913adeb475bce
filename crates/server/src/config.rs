//! Command-line and environment configuration for the `ocr-portal` binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Runtime configuration.
///
/// Every option can also be set through its `OCR_PORTAL_*` environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "ocr-portal", version, about = "Web front end for batch PDF OCR")]
pub struct Config {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "OCR_PORTAL_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(short = 'p', long, env = "OCR_PORTAL_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory that receives recognized documents and serves downloads.
    #[arg(long, env = "OCR_PORTAL_OUTPUT_DIR", default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Path to the `ocrmypdf` executable.
    #[arg(long, env = "OCR_PORTAL_OCRMYPDF", default_value = "ocrmypdf")]
    pub ocrmypdf: PathBuf,

    /// Upper bound on concurrent OCR runs across all batches. 0 = unbounded.
    #[arg(long, env = "OCR_PORTAL_MAX_PARALLEL_OCR", default_value_t = 0)]
    pub max_parallel_ocr: usize,

    /// Largest accepted upload request, in MiB.
    #[arg(long, env = "OCR_PORTAL_MAX_UPLOAD_MB", default_value_t = 512)]
    pub max_upload_mb: usize,
}

impl Config {
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["ocr-portal"]).unwrap();
        assert_eq!(config.server_addr().to_string(), "127.0.0.1:8000");
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.ocrmypdf, PathBuf::from("ocrmypdf"));
        assert_eq!(config.max_parallel_ocr, 0);
        assert_eq!(config.max_upload_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "ocr-portal",
            "--host",
            "0.0.0.0",
            "-p",
            "9100",
            "--output-dir",
            "/srv/ocr",
            "--max-parallel-ocr",
            "4",
        ])
        .unwrap();
        assert_eq!(config.server_addr().to_string(), "0.0.0.0:9100");
        assert_eq!(config.output_dir, PathBuf::from("/srv/ocr"));
        assert_eq!(config.max_parallel_ocr, 4);
    }

    #[test]
    fn test_invalid_host_rejected() {
        assert!(Config::try_parse_from(["ocr-portal", "--host", "not-an-ip"]).is_err());
    }
}
