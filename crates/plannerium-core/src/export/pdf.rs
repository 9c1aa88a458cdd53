//! PDF rendering through an external `wkhtmltopdf` binary.
//!
//! Detection happens once, when the capability is constructed. Callers that
//! hold `None` simply cannot export PDF.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::ExportError;

pub const DEFAULT_BINARY: &str = "wkhtmltopdf";

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    binary: PathBuf,
}

impl PdfRenderer {
    /// Look for `wkhtmltopdf` on `PATH`.
    pub fn detect() -> Option<Self> {
        let found = find_on_path(DEFAULT_BINARY).map(|binary| Self { binary });
        match &found {
            Some(r) => tracing::info!(binary = %r.binary.display(), "PDF export enabled"),
            None => tracing::warn!("wkhtmltopdf not found on PATH; PDF export disabled"),
        }
        found
    }

    /// Use an explicit binary, failing if it does not exist.
    pub fn with_binary(path: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let binary = path.into();
        if binary.is_file() {
            Ok(Self { binary })
        } else {
            Err(ExportError::PdfUnavailable)
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Convert an HTML document to PDF bytes.
    pub async fn render(&self, html: &str) -> Result<Vec<u8>, ExportError> {
        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--encoding", "utf-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExportError::PdfFailed("renderer stdin unavailable".into()))?;
        let input = html.as_bytes().to_vec();
        // Feed stdin concurrently so a full stdout pipe cannot deadlock us.
        let writer = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.wait_with_output().await?;
        let written = writer
            .await
            .map_err(|e| ExportError::PdfFailed(format!("stdin writer panicked: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first = stderr.lines().next().unwrap_or("no diagnostics");
            return Err(ExportError::PdfFailed(format!(
                "{} exited with {}: {first}",
                DEFAULT_BINARY, output.status
            )));
        }
        written?;
        if output.stdout.is_empty() {
            return Err(ExportError::PdfFailed("renderer produced no output".into()));
        }
        Ok(output.stdout)
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
