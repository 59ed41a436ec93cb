//! S3-backed transfer engine: streaming workers over presigned URLs.
//!
//! Each started transfer gets its own tokio task. The task publishes byte
//! counters and state into the shared handle and checks the pause/cancel
//! flags on every chunk, so control signals take effect within one chunk of
//! network progress.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use log::{info, warn};
use reqwest::Client;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio_util::io::ReaderStream;

use super::{HandleShared, NativeState, TransferEngine, TransferHandle};
use crate::error::EngineError;
use crate::store::{presigned, StoreConfig};

/// Write buffer size for downloads (2 MB) - reduces I/O operations
const WRITE_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Validity of the presigned URL backing a single worker request
const PRESIGN_EXPIRY_SECS: u64 = 3600;

/// Why a worker stopped short of completion. Pauses are handled inside the
/// worker loop and never surface here.
enum WorkerStop {
    Canceled,
    Failed(String),
}

/// Transfer engine backed by one bucket on an S3-compatible store.
pub struct S3Engine {
    config: StoreConfig,
    client: Client,
}

impl S3Engine {
    pub fn new(config: StoreConfig) -> Result<S3Engine, EngineError> {
        let client = Client::builder()
            .build()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(S3Engine { config, client })
    }
}

impl TransferEngine for S3Engine {
    fn start_upload(&self, local_path: &Path) -> Result<TransferHandle, EngineError> {
        let metadata = std::fs::metadata(local_path)?;
        if !metadata.is_file() {
            return Err(EngineError::LocalIo(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "upload source is not a regular file",
            )));
        }

        let handle = TransferHandle::new();
        let shared = handle.shared();
        shared.set_total(metadata.len());

        let client = self.client.clone();
        let config = self.config.clone();
        let key = object_key(local_path);
        let local_path = local_path.to_path_buf();
        tokio::spawn(async move {
            run_upload(client, config, key, local_path, shared).await;
        });

        Ok(handle)
    }

    fn start_download(
        &self,
        remote_key: &str,
        local_path: &Path,
    ) -> Result<TransferHandle, EngineError> {
        let handle = TransferHandle::new();
        let shared = handle.shared();

        let client = self.client.clone();
        let config = self.config.clone();
        let key = remote_key.to_string();
        let destination = local_path.to_path_buf();
        tokio::spawn(async move {
            run_download(client, config, key, destination, shared).await;
        });

        Ok(handle)
    }
}

/// Objects are stored under the file's own name.
fn object_key(local_path: &Path) -> String {
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| local_path.to_string_lossy().into_owned())
}

async fn run_download(
    client: Client,
    config: StoreConfig,
    key: String,
    destination: PathBuf,
    shared: Arc<HandleShared>,
) {
    match download_loop(&client, &config, &key, &destination, &shared).await {
        Ok(()) => info!("download completed: {}", key),
        Err(WorkerStop::Canceled) => {
            let _ = tokio::fs::remove_file(&destination).await;
            shared.set_state(NativeState::Canceled);
            info!("download canceled: {}", key);
        }
        Err(WorkerStop::Failed(e)) => {
            shared.set_state(NativeState::Failed);
            warn!("download failed: {} - {}", key, e);
        }
    }
}

async fn download_loop(
    client: &Client,
    config: &StoreConfig,
    key: &str,
    destination: &Path,
    shared: &Arc<HandleShared>,
) -> Result<(), WorkerStop> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| WorkerStop::Failed(format!("failed to create directory: {}", e)))?;
    }

    loop {
        if shared.cancel_requested() {
            return Err(WorkerStop::Canceled);
        }
        if shared.pause_requested() {
            shared.set_state(NativeState::Paused);
            shared.wait_resumed().await;
            continue;
        }

        // Resume from whatever partial file is already on disk.
        let existing_bytes = match tokio::fs::metadata(destination).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        shared.set_transferred(existing_bytes);

        let url = presigned::download_url(config, key, PRESIGN_EXPIRY_SECS)
            .await
            .map_err(|e| WorkerStop::Failed(format!("failed to generate presigned URL: {}", e)))?;

        let mut request = client.get(&url);
        if existing_bytes > 0 {
            request = request.header("Range", format!("bytes={}-", existing_bytes));
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkerStop::Failed(format!("download request failed: {}", e)))?;
        if !response.status().is_success() && response.status().as_u16() != 206 {
            return Err(WorkerStop::Failed(format!(
                "download failed: {}",
                response.status()
            )));
        }

        if shared.total() == 0 {
            let content_length = response.content_length().unwrap_or(0) + existing_bytes;
            shared.set_total(content_length);
        }
        shared.set_state(NativeState::InProgress);

        let mut file = if existing_bytes > 0 {
            let mut f = OpenOptions::new()
                .write(true)
                .open(destination)
                .await
                .map_err(|e| WorkerStop::Failed(format!("failed to open file: {}", e)))?;
            f.seek(SeekFrom::End(0))
                .await
                .map_err(|e| WorkerStop::Failed(format!("failed to seek: {}", e)))?;
            f
        } else {
            File::create(destination)
                .await
                .map_err(|e| WorkerStop::Failed(format!("failed to create file: {}", e)))?
        };

        let mut stream = response.bytes_stream();
        let mut write_buffer: Vec<u8> = Vec::with_capacity(WRITE_BUFFER_SIZE);
        let mut paused_mid_stream = false;

        while let Some(chunk_result) = stream.next().await {
            if shared.cancel_requested() {
                return Err(WorkerStop::Canceled);
            }
            if shared.pause_requested() {
                paused_mid_stream = true;
                break;
            }

            let chunk = chunk_result
                .map_err(|e| WorkerStop::Failed(format!("failed to read chunk: {}", e)))?;
            write_buffer.extend_from_slice(&chunk);
            shared.add_transferred(chunk.len() as u64);

            if write_buffer.len() >= WRITE_BUFFER_SIZE {
                file.write_all(&write_buffer)
                    .await
                    .map_err(|e| WorkerStop::Failed(format!("failed to write buffer: {}", e)))?;
                write_buffer.clear();
            }
        }

        if !write_buffer.is_empty() {
            file.write_all(&write_buffer)
                .await
                .map_err(|e| WorkerStop::Failed(format!("failed to write buffer: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| WorkerStop::Failed(format!("failed to flush file: {}", e)))?;

        if paused_mid_stream {
            // Progress is safe on disk; the next iteration parks on the
            // pause flag and later re-issues a ranged request from the new
            // offset.
            continue;
        }

        if shared.total() == 0 {
            shared.set_total(shared.transferred());
        }
        shared.set_state(NativeState::Completed);
        return Ok(());
    }
}

async fn run_upload(
    client: Client,
    config: StoreConfig,
    key: String,
    local_path: PathBuf,
    shared: Arc<HandleShared>,
) {
    match upload_loop(&client, &config, &key, &local_path, &shared).await {
        Ok(()) => info!("upload completed: {}", key),
        Err(WorkerStop::Canceled) => {
            shared.set_state(NativeState::Canceled);
            info!("upload canceled: {}", key);
        }
        Err(WorkerStop::Failed(e)) => {
            shared.set_state(NativeState::Failed);
            warn!("upload failed: {} - {}", key, e);
        }
    }
}

async fn upload_loop(
    client: &Client,
    config: &StoreConfig,
    key: &str,
    local_path: &Path,
    shared: &Arc<HandleShared>,
) -> Result<(), WorkerStop> {
    loop {
        if shared.cancel_requested() {
            return Err(WorkerStop::Canceled);
        }
        if shared.pause_requested() {
            shared.set_state(NativeState::Paused);
            shared.wait_resumed().await;
            continue;
        }

        // A single streaming PUT cannot resume mid-body; every attempt
        // starts over from the beginning of the file.
        shared.set_transferred(0);

        let url = presigned::upload_url(config, key, PRESIGN_EXPIRY_SECS)
            .await
            .map_err(|e| WorkerStop::Failed(format!("failed to generate presigned URL: {}", e)))?;

        let file = File::open(local_path)
            .await
            .map_err(|e| WorkerStop::Failed(format!("failed to open file: {}", e)))?;
        let total = shared.total();
        shared.set_state(NativeState::InProgress);

        let progress = shared.clone();
        let body_stream = ReaderStream::new(file).map(move |chunk| {
            let chunk = chunk?;
            if progress.cancel_requested() || progress.pause_requested() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "upload interrupted",
                ));
            }
            progress.add_transferred(chunk.len() as u64);
            Ok(chunk)
        });

        let result = client
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                shared.set_transferred(total);
                shared.set_state(NativeState::Completed);
                return Ok(());
            }
            Ok(response) => {
                return Err(WorkerStop::Failed(format!(
                    "upload failed: {}",
                    response.status()
                )))
            }
            Err(_) if shared.cancel_requested() => return Err(WorkerStop::Canceled),
            // The aborted request was a pause; park at the top of the loop.
            Err(_) if shared.pause_requested() => continue,
            Err(e) => {
                return Err(WorkerStop::Failed(format!("upload request failed: {}", e)))
            }
        }
    }
}
