//! A scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dynomap_model::{DynamoDBError, DynamoDBOperation};
use parking_lot::Mutex;
use serde_json::Value;

use crate::transport::DynamoTransport;

/// Records every request and replays queued responses per operation.
///
/// An operation with nothing queued answers `{}`, which decodes as the
/// default output.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    requests: Mutex<Vec<(DynamoDBOperation, Value)>>,
    responses: Mutex<HashMap<DynamoDBOperation, VecDeque<Result<Value, DynamoDBError>>>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response body.
    pub(crate) fn respond(&self, op: DynamoDBOperation, body: Value) {
        self.responses.lock().entry(op).or_default().push_back(Ok(body));
    }

    /// Queue an error.
    pub(crate) fn fail(&self, op: DynamoDBOperation, err: DynamoDBError) {
        self.responses.lock().entry(op).or_default().push_back(Err(err));
    }

    /// Bodies sent for one operation, in order.
    pub(crate) fn requests(&self, op: DynamoDBOperation) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Number of calls made for one operation.
    pub(crate) fn calls(&self, op: DynamoDBOperation) -> usize {
        self.requests.lock().iter().filter(|(o, _)| *o == op).count()
    }
}

#[async_trait]
impl DynamoTransport for MockTransport {
    async fn send(&self, op: DynamoDBOperation, body: Bytes) -> Result<Bytes, DynamoDBError> {
        let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        self.requests.lock().push((op, request));
        let next = self.responses.lock().get_mut(&op).and_then(VecDeque::pop_front);
        match next {
            Some(Ok(body)) => Ok(Bytes::from(body.to_string())),
            Some(Err(err)) => Err(err),
            None => Ok(Bytes::from_static(b"{}")),
        }
    }
}
