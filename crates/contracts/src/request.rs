//! Write request / response exchanged with a `LogClient`

use serde::{Deserialize, Serialize};

use crate::{LogItem, PendingBatch};

/// System tag carrying the batch identifier
pub const PACK_ID_TAG: &str = "__pack_id__";

/// Wire encoding selector
///
/// Only affects the content type announced on the write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogsFormat {
    #[default]
    Protobuf,
    Json,
}

impl LogsFormat {
    /// Content type sent with the request
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Protobuf => "application/x-protobuf",
            Self::Json => "application/json",
        }
    }
}

/// Key/value tag attached to a whole request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTag {
    pub key: String,
    pub value: String,
}

/// A single write against the ingestion service.
///
/// Borrows the batch so that retries do not copy the records.
#[derive(Debug, Clone, Serialize)]
pub struct PutLogsRequest<'a> {
    pub project: &'a str,
    pub logstore: &'a str,
    pub topic: &'a str,
    pub source: &'a str,
    pub items: &'a [LogItem],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_hash: Option<&'a str>,
    pub tags: Vec<LogTag>,
    pub content_type: &'static str,
}

impl<'a> PutLogsRequest<'a> {
    /// Build the request for one attempt of `batch`.
    ///
    /// An empty shard hash is treated as absent.
    pub fn from_batch(batch: &'a PendingBatch, format: LogsFormat) -> Self {
        Self {
            project: &batch.project,
            logstore: &batch.logstore,
            topic: &batch.topic,
            source: &batch.source,
            items: &batch.items,
            shard_hash: batch.shard_hash.as_deref().filter(|h| !h.is_empty()),
            tags: vec![LogTag {
                key: PACK_ID_TAG.to_string(),
                value: batch.package_id().to_string(),
            }],
            content_type: format.content_type(),
        }
    }

    /// Value of a request tag
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// Successful write acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PutLogsResponse {
    /// Server-assigned request id
    pub request_id: String,
}

impl PutLogsResponse {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}
