//! Model weight acquisition.
//!
//! Enumerates all files of a named model repository on the Hugging Face hub
//! and streams each one to disk, creating parent directories as needed and
//! reporting per-file size and transfer speed. A failed file is logged and
//! skipped, not fatal; there is no resume or checksum verification.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{InferenceError, InferenceResult};

const HUB_BASE: &str = "https://huggingface.co";

/// Repository namespace on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightRepoType {
    #[default]
    Model,
    Dataset,
}

impl WeightRepoType {
    fn api_segment(&self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Dataset => "datasets",
        }
    }

    fn resolve_prefix(&self) -> &'static str {
        match self {
            Self::Model => "",
            Self::Dataset => "datasets/",
        }
    }
}

impl std::str::FromStr for WeightRepoType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(Self::Model),
            "dataset" => Ok(Self::Dataset),
            other => Err(format!("unknown repo type `{other}` (model|dataset)")),
        }
    }
}

/// Summary of a weight fetch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    siblings: Vec<RepoFile>,
}

#[derive(Debug, Deserialize)]
struct RepoFile {
    rfilename: String,
}

/// Download every file of `repo_id` into `dest_dir`.
pub async fn fetch_weights(
    repo_id: &str,
    repo_type: WeightRepoType,
    dest_dir: &Path,
) -> InferenceResult<FetchReport> {
    let client = reqwest::Client::new();

    let api_url = format!("{HUB_BASE}/api/{}/{repo_id}", repo_type.api_segment());
    info!("Enumerating files of {repo_id}");
    let repo: RepoInfo = client
        .get(&api_url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| InferenceError::download_failed(format!("listing {repo_id}: {e}")))?
        .json()
        .await?;

    let mut report = FetchReport {
        downloaded: 0,
        failed: 0,
    };

    for file in &repo.siblings {
        let url = format!(
            "{HUB_BASE}/{}{repo_id}/resolve/main/{}",
            repo_type.resolve_prefix(),
            file.rfilename
        );
        let local_path = dest_dir.join(&file.rfilename);

        match download_file(&client, &url, &local_path).await {
            Ok(bytes) => {
                report.downloaded += 1;
                info!("Downloaded {} ({})", local_path.display(), format_size(bytes));
            }
            Err(e) => {
                report.failed += 1;
                warn!("Failed to download {}: {e}", file.rfilename);
            }
        }
    }

    info!(
        "Weight fetch complete: {} downloaded, {} failed",
        report.downloaded, report.failed
    );
    Ok(report)
}

/// Stream one file to disk, returning its size in bytes.
///
/// The body is written to a `.part` sibling and renamed into place once
/// complete, so an interrupted transfer never leaves a truncated weight file
/// under the final name.
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    local_path: &Path,
) -> InferenceResult<u64> {
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| InferenceError::download_failed(e.to_string()))?;

    let started = Instant::now();
    let staging = staging_path(local_path);
    let written = stream_to_file(response.bytes_stream(), &staging).await?;
    tokio::fs::rename(&staging, local_path).await?;

    let secs = started.elapsed().as_secs_f64();
    let speed = if secs > 0.0 { written as f64 / secs } else { 0.0 };
    info!(
        "{} -> {} ({}/s)",
        url,
        format_size(written),
        format_size(speed as u64)
    );

    Ok(written)
}

/// The in-progress sibling of a download target.
fn staging_path(local_path: &Path) -> PathBuf {
    let mut os = local_path.as_os_str().to_os_string();
    os.push(".part");
    PathBuf::from(os)
}

/// Write a chunk stream to `path`, removing the file again if any chunk or
/// write fails.
async fn stream_to_file<S, B, E>(stream: S, path: &Path) -> InferenceResult<u64>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    match write_chunks(stream, path).await {
        Ok(written) => Ok(written),
        Err(e) => {
            let _ = tokio::fs::remove_file(path).await;
            Err(e)
        }
    }
}

async fn write_chunks<S, B, E>(mut stream: S, path: &Path) -> InferenceResult<u64>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| InferenceError::download_failed(e.to_string()))?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Human-readable byte size.
fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KiB", "MiB", "GiB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TiB")
}
