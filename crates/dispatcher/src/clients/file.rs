//! FileClient - appends each request as one JSON line

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use contracts::{ContractError, LogClient, PutLogsRequest, PutLogsResponse};
use tracing::{debug, error, instrument};

/// Configuration for FileClient
#[derive(Debug, Clone)]
pub struct FileClientConfig {
    /// Output file, created (with parent dirs) if missing
    pub path: PathBuf,
}

impl FileClientConfig {
    /// Create config from params map; `path` is required
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        params.get("path").map(|path| Self {
            path: PathBuf::from(path),
        })
    }
}

/// Client that writes requests to a local JSON-lines file
pub struct FileClient {
    name: String,
    config: FileClientConfig,
    writer: Mutex<BufWriter<File>>,
    sequence: AtomicU64,
}

impl FileClient {
    pub fn new(name: impl Into<String>, config: FileClientConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: Mutex::new(BufWriter::new(file)),
            sequence: AtomicU64::new(0),
        })
    }

    /// Create from params map (for the client pool)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileClientConfig::from_params(params).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing 'path' param")
        })?;
        Self::new(name, config)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }

    fn append_line(&self, request: &PutLogsRequest<'_>) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, request)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl LogClient for FileClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_client_put_logs",
        skip(self, request),
        fields(client = %self.name, items = request.items.len())
    )]
    async fn put_logs(
        &self,
        request: &PutLogsRequest<'_>,
    ) -> Result<PutLogsResponse, ContractError> {
        let request_id = format!(
            "{}-{:X}",
            self.name,
            self.sequence.fetch_add(1, Ordering::Relaxed)
        );

        self.append_line(request).map_err(|e| {
            error!(client = %self.name, path = %self.config.path.display(), error = %e, "Append failed");
            ContractError::write("WriteFailed", e.to_string(), &request_id)
        })?;

        debug!(client = %self.name, %request_id, "Request appended");
        Ok(PutLogsResponse::new(request_id))
    }
}
