//! Client-side traits consumed by the dispatcher
//!
//! - `LogClient`: performs one remote write
//! - `ClientResolver`: maps a project to its client
//! - `BudgetRelease`: returns consumed bytes to the upstream budget

use std::sync::Arc;

use crate::{ContractError, PutLogsRequest, PutLogsResponse};

/// Remote write capability
///
/// Implementations are shared between workers, hence `&self`.
#[trait_variant::make(LogClient: Send)]
pub trait LocalLogClient {
    /// Client name (used for logging)
    fn name(&self) -> &str;

    /// Write one request
    ///
    /// # Errors
    /// Returns a `ContractError::Write` describing the failure
    async fn put_logs(
        &self,
        request: &PutLogsRequest<'_>,
    ) -> Result<PutLogsResponse, ContractError>;
}

/// Destination resolver
pub trait ClientResolver: Send + Sync + 'static {
    type Client: LogClient + Sync + 'static;

    /// Client registered for `project`, or `None` if unknown
    fn get_client(&self, project: &str) -> Option<Arc<Self::Client>>;
}

/// Sink returning bytes to the upstream admission budget
///
/// Called exactly once per batch; must not block indefinitely.
pub trait BudgetRelease: Send + Sync {
    fn release_bytes(&self, bytes: usize);
}

impl<F> BudgetRelease for F
where
    F: Fn(usize) + Send + Sync,
{
    fn release_bytes(&self, bytes: usize) {
        self(bytes)
    }
}
