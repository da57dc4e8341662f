//! Built-in client implementations
//!
//! Contains ConsoleClient and FileClient.

mod console;
mod file;

use contracts::{ContractError, LogClient, PutLogsRequest, PutLogsResponse};

pub use self::console::ConsoleClient;
pub use self::file::{FileClient, FileClientConfig};

/// Any built-in client, as stored by a blueprint-built [`ClientPool`](crate::ClientPool)
pub enum BuiltinClient {
    Console(ConsoleClient),
    File(FileClient),
}

impl LogClient for BuiltinClient {
    fn name(&self) -> &str {
        match self {
            Self::Console(c) => c.name(),
            Self::File(c) => c.name(),
        }
    }

    async fn put_logs(
        &self,
        request: &PutLogsRequest<'_>,
    ) -> Result<PutLogsResponse, ContractError> {
        match self {
            Self::Console(c) => c.put_logs(request).await,
            Self::File(c) => c.put_logs(request).await,
        }
    }
}
