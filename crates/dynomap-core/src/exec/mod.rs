//! Execution harness: retries, pagination, batch chunking and table
//! lifecycle polling around a [`DynamoTransport`].

pub mod batch;
pub mod lifecycle;
pub mod paging;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dynomap_model::{DynamoDBError, DynamoDBOperation};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use batch::{
    BatchProjection, MAX_READ_BATCH_SIZE, MAX_WRITE_BATCH_SIZE, batch_get, batch_write,
};
pub use lifecycle::{create_tables, delete_tables, wait_for_tables_deleted, wait_for_tables_ready};
pub use paging::{Page, PagedRequest, collect_limited, items, list_all_tables, pages};
pub use retry::{ErrorFilter, ExecOptions, RetryPolicy, exec, exec_blocking, sleep_or_cancel};

use crate::error::MapperResult;
use crate::transport::DynamoTransport;

/// A transport paired with its retry policy and cancellation token.
#[derive(Debug, Clone)]
pub struct Executor {
    transport: Arc<dyn DynamoTransport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Executor {
    /// Create an executor.
    #[must_use]
    pub fn new(
        transport: Arc<dyn DynamoTransport>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            policy,
            cancel,
        }
    }

    /// The underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn DynamoTransport> {
        &self.transport
    }

    /// The retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The token aborting backoff sleeps and polls.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Same policy and token, another transport.
    #[must_use]
    pub fn with_transport(&self, transport: Arc<dyn DynamoTransport>) -> Self {
        Self {
            transport,
            ..self.clone()
        }
    }

    /// Same transport and policy, another token.
    #[must_use]
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Run one operation with the default options.
    pub async fn exec<T, F, Fut>(
        &self,
        op: DynamoDBOperation,
        table: &str,
        call: F,
    ) -> MapperResult<T>
    where
        F: FnMut(Arc<dyn DynamoTransport>) -> Fut,
        Fut: Future<Output = Result<T, DynamoDBError>>,
    {
        self.exec_with(op, table, &ExecOptions::default(), call).await
    }

    /// Run one operation.
    pub async fn exec_with<T, F, Fut>(
        &self,
        op: DynamoDBOperation,
        table: &str,
        options: &ExecOptions,
        mut call: F,
    ) -> MapperResult<T>
    where
        F: FnMut(Arc<dyn DynamoTransport>) -> Fut,
        Fut: Future<Output = Result<T, DynamoDBError>>,
    {
        debug!(operation = %op, table, "calling store");
        exec(&self.policy, &self.cancel, options, op, || {
            call(Arc::clone(&self.transport))
        })
        .await
    }

    /// Sleep unless cancelled.
    pub async fn sleep(&self, delay: Duration) -> MapperResult<()> {
        sleep_or_cancel(&self.cancel, delay).await
    }
}
