//! The high-level client.
//!
//! [`DynamoMapper`] ties the registry, converters, execution harness and
//! sequence source together behind typed operations on [`Record`] types.
//! Operations are split by concern: table management in `tables`, single and
//! batch item access in `items`, parent/child rows in `related`, and query and
//! scan reads in `read`.
//!
//! [`Record`]: crate::metadata::Record

mod items;
mod read;
mod related;
mod tables;

use std::sync::Arc;

use dynomap_model::types::Key;
use tokio_util::sync::CancellationToken;

use crate::config::MapperConfig;
use crate::convert::Converters;
use crate::error::MapperResult;
use crate::exec::{Executor, RetryPolicy};
use crate::ids::CompositeId;
use crate::metadata::{MetadataRegistry, TableMetadata};
use crate::sequence::{DynamoSequenceSource, SequenceSource};
use crate::transport::DynamoTransport;

/// Object mapper over a DynamoDB transport.
///
/// Cloning is cheap: clones share the registry, converters, configuration
/// and sequence source.
#[derive(Debug, Clone)]
pub struct DynamoMapper {
    executor: Executor,
    registry: Arc<MetadataRegistry>,
    converters: Converters,
    sequences: Option<Arc<dyn SequenceSource>>,
    config: Arc<MapperConfig>,
}

impl DynamoMapper {
    /// A mapper using the global registry and default configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn DynamoTransport>) -> Self {
        Self::with_config(transport, MapperConfig::default())
    }

    /// A mapper using the global registry.
    #[must_use]
    pub fn with_config(transport: Arc<dyn DynamoTransport>, config: MapperConfig) -> Self {
        Self::with_registry(transport, config, MetadataRegistry::global())
    }

    /// A mapper over its own registry.
    #[must_use]
    pub fn with_registry(
        transport: Arc<dyn DynamoTransport>,
        config: MapperConfig,
        registry: Arc<MetadataRegistry>,
    ) -> Self {
        let executor = Executor::new(
            transport,
            RetryPolicy::from_config(&config),
            CancellationToken::new(),
        );
        let converters = Converters::new(Arc::clone(&registry), &config);
        Self {
            executor,
            registry,
            converters,
            sequences: None,
            config: Arc::new(config),
        }
    }

    /// Draw auto-increment ids from `sequences` instead of the `Seq` table.
    #[must_use]
    pub fn with_sequences(mut self, sequences: Arc<dyn SequenceSource>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    /// Abort backoff sleeps and table polls when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    /// A sibling mapper sending through `transport`, sharing everything else.
    #[must_use]
    pub fn client_with(&self, transport: Arc<dyn DynamoTransport>) -> Self {
        Self {
            executor: self.executor.with_transport(transport),
            ..self.clone()
        }
    }

    /// The metadata registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// The attribute value converters.
    #[must_use]
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The execution harness.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The token aborting waits.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        self.executor.cancellation()
    }

    /// The source of auto-increment ids. Without an explicit source, counters
    /// live in the `Seq` table reached through this mapper's transport.
    #[must_use]
    pub fn sequences(&self) -> Arc<dyn SequenceSource> {
        match &self.sequences {
            Some(sequences) => Arc::clone(sequences),
            None => Arc::new(DynamoSequenceSource::new(
                self.executor.clone(),
                self.config.default_throughput(),
                self.config.poll_table_status,
            )),
        }
    }

    fn key_of(&self, table: &TableMetadata, id: &CompositeId) -> MapperResult<Key> {
        self.converters.to_key(table, &id.hash, id.range.as_ref())
    }
}


#[cfg(test)]
mod tests {
    use dynomap_model::DynamoDBOperation;
    use serde_json::json;

    use super::test_support::mapper;
    use super::*;
    use crate::builder::fixtures::Product;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn test_should_share_state_with_sibling_client() {
        let (mapper, first) = mapper(MapperConfig::default());
        mapper.register_table::<Product>().unwrap();
        let second = MockTransport::new();
        let sibling = mapper.client_with(second.clone());

        assert!(Arc::ptr_eq(mapper.registry(), sibling.registry()));
        sibling.get_table_names().await.unwrap();
        assert_eq!(second.calls(DynamoDBOperation::ListTables), 1);
        assert_eq!(first.calls(DynamoDBOperation::ListTables), 0);
    }

    #[tokio::test]
    async fn test_should_default_to_table_backed_sequences() {
        let transport = MockTransport::new();
        let mapper = DynamoMapper::with_registry(
            transport.clone(),
            MapperConfig::default(),
            Arc::new(MetadataRegistry::new()),
        );
        transport.respond(
            DynamoDBOperation::UpdateItem,
            json!({"Attributes": {"Counter": {"N": "3"}}}),
        );

        let ids = mapper.sequences().next_sequences("Product", 3).await.unwrap();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            transport.requests(DynamoDBOperation::UpdateItem)[0]["TableName"],
            "Seq"
        );
    }
}
