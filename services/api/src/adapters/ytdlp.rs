//! services/api/src/adapters/ytdlp.rs
//!
//! Runs `yt-dlp` as a subprocess to obtain the video's JSON metadata document.
//! Implements the `MetadataTool` port.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lattice_core::domain::VideoReference;
use lattice_core::ports::{AcquisitionError, CaptionRequest, MetadataTool};
use tokio::process::Command;
use tracing::{debug, warn};

const BINARY_NAME: &str = "yt-dlp";

/// Well-known install locations checked before falling back to `PATH`.
const CANDIDATE_DIRS: [&str; 2] = ["/opt/homebrew/bin", "/usr/local/bin"];

/// stderr phrases that mean the video itself cannot be served.
const UNAVAILABLE_PHRASES: [&str; 3] = [
    "Private video",
    "Video unavailable",
    "This video is not available",
];

#[derive(Clone, Debug)]
pub struct YtDlpAdapter {
    binary: PathBuf,
    timeout: Duration,
}

impl YtDlpAdapter {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    /// Uses `configured` when given, otherwise the first install location that
    /// exists, otherwise the bare binary name resolved through `PATH`.
    pub fn locate(configured: Option<PathBuf>, timeout: Duration) -> Self {
        let binary = configured.unwrap_or_else(|| {
            CANDIDATE_DIRS
                .iter()
                .map(|dir| Path::new(dir).join(BINARY_NAME))
                .find(|candidate| candidate.is_file())
                .unwrap_or_else(|| PathBuf::from(BINARY_NAME))
        });
        Self::new(binary, timeout)
    }

    fn args(reference: &VideoReference, captions: CaptionRequest) -> Vec<&str> {
        let mut args = vec!["--skip-download", "--no-warnings"];
        if captions == CaptionRequest::AutoEnglish {
            args.extend(["--write-auto-subs", "--sub-langs", "en"]);
        }
        args.extend(["--dump-json", reference.as_str()]);
        args
    }
}

/// Maps a failed run's stderr onto the acquisition error taxonomy.
pub fn classify_failure(stderr: &str) -> AcquisitionError {
    if UNAVAILABLE_PHRASES.iter().any(|p| stderr.contains(p)) {
        AcquisitionError::VideoUnavailable
    } else {
        AcquisitionError::ToolExecutionFailed(stderr.trim().to_string())
    }
}

#[async_trait]
impl MetadataTool for YtDlpAdapter {
    async fn dump_json(
        &self,
        reference: &VideoReference,
        captions: CaptionRequest,
    ) -> Result<Vec<u8>, AcquisitionError> {
        debug!(binary = %self.binary.display(), url = %reference, ?captions, "Running yt-dlp");

        let run = Command::new(&self.binary)
            .args(Self::args(reference, captions))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                AcquisitionError::ToolExecutionFailed(format!(
                    "yt-dlp timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AcquisitionError::ToolExecutionFailed(format!(
                    "failed to start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url = %reference, status = %output.status, "yt-dlp failed");
            return Err(classify_failure(&stderr));
        }

        Ok(output.stdout)
    }
}
