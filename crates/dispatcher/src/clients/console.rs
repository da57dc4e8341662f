//! ConsoleClient - logs a request summary via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{ContractError, LogClient, PutLogsRequest, PutLogsResponse, PACK_ID_TAG};
use tracing::{info, instrument};

/// Client that only logs what it would have sent
pub struct ConsoleClient {
    name: String,
    sequence: AtomicU64,
}

impl ConsoleClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: AtomicU64::new(0),
        }
    }

    fn log_request_summary(&self, request: &PutLogsRequest<'_>) {
        let fields: usize = request.items.iter().map(|item| item.contents.len()).sum();

        info!(
            client = %self.name,
            project = request.project,
            logstore = request.logstore,
            topic = request.topic,
            items = request.items.len(),
            fields,
            shard_hash = request.shard_hash.unwrap_or_default(),
            pack_id = request.tag(PACK_ID_TAG).unwrap_or_default(),
            content_type = request.content_type,
            "PutLogs"
        );
    }
}

impl LogClient for ConsoleClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "console_client_put_logs",
        skip(self, request),
        fields(client = %self.name, project = request.project)
    )]
    async fn put_logs(
        &self,
        request: &PutLogsRequest<'_>,
    ) -> Result<PutLogsResponse, ContractError> {
        self.log_request_summary(request);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(PutLogsResponse::new(format!("{}-{seq:X}", self.name)))
    }
}
