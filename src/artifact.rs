// src/artifact.rs
//! Optional post-update side effects, kept out of the extractors so those
//! stay pure. The hook runs only when a source reported an update and the
//! source opted in; it is best-effort and never fails the run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::extract::Snapshot;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait ArtifactHook: Send + Sync {
    /// Called after an update was decided and persisted-to-be. Must not
    /// return errors; report them and move on.
    async fn on_update(&self, source_name: &str, snapshot: &Snapshot);
}

/// Downloads the updated document and compresses it with ghostscript.
pub struct PdfArchiver {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl PdfArchiver {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir,
        }
    }

    async fn archive(&self, source_name: &str, url: &str, version: Option<&str>) -> Result<()> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .context("creating download dir")?;

        let stem = file_stem(source_name);
        let version_str = version.map(|v| format!("-v{v}")).unwrap_or_default();
        let stamp = Utc::now().format("%Y%m%d");
        let path = self
            .download_dir
            .join(format!("{stem}{version_str}_{stamp}.pdf"));
        let compressed = self
            .download_dir
            .join(format!("{stem}{version_str}_{stamp}-compressed.pdf"));

        tracing::info!(url, file = %path.display(), "downloading artifact");

        let bytes = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .context("artifact download")?
            .error_for_status()
            .context("artifact non-2xx")?
            .bytes()
            .await
            .context("artifact body")?;

        let mut file = tokio::fs::File::create(&path).await.context("create file")?;
        file.write_all(&bytes).await.context("write file")?;
        file.flush().await.context("flush file")?;
        drop(file);

        let output = tokio::process::Command::new("gs")
            .args([
                "-sDEVICE=pdfwrite",
                "-dCompatibilityLevel=1.4",
                "-dPDFSETTINGS=/screen",
                "-dNOPAUSE",
                "-dBATCH",
            ])
            .arg(format!("-sOutputFile={}", compressed.display()))
            .arg(&path)
            .output()
            .await
            .context("running ghostscript")?;

        if output.status.success() {
            let original = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            let shrunk = tokio::fs::metadata(&compressed)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            tracing::info!(
                original_bytes = original,
                compressed_bytes = shrunk,
                file = %compressed.display(),
                "artifact compressed"
            );
        } else {
            tracing::warn!(
                stderr = %String::from_utf8_lossy(&output.stderr),
                "ghostscript compression failed"
            );
        }

        Ok(())
    }
}

fn file_stem(source_name: &str) -> String {
    let stem: String = source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_sanitizes_source_names() {
        assert_eq!(file_stem("WTC Terrain Map Pack"), "WTC_Terrain_Map_Pack");
        assert_eq!(file_stem(""), "document");
    }
}

#[async_trait]
impl ArtifactHook for PdfArchiver {
    async fn on_update(&self, source_name: &str, snapshot: &Snapshot) {
        let Snapshot::VersionedDocument {
            version,
            document_url: Some(url),
            ..
        } = snapshot
        else {
            tracing::debug!(source = source_name, "no document url, skipping artifact");
            return;
        };

        if let Err(e) = self.archive(source_name, url, version.as_deref()).await {
            tracing::warn!(source = source_name, error = ?e, "artifact pipeline failed");
        }
    }
}
