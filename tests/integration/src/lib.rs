//! Live tests for dynomap.
//!
//! These tests require a DynamoDB-compatible endpoint, by default a ruststack
//! gateway at `localhost:4566` (override with `DYNOMAP_ENDPOINT`). They are
//! marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p dynomap-integration -- --ignored
//! ```

use std::sync::{Arc, LazyLock, Once};
use std::time::Duration;

use dynomap_core::{DynamoMapper, DynamoSequenceSource, MapperConfig, MetadataRegistry};
use dynomap_http::{HttpTransport, HttpTransportConfig};

static INIT: Once = Once::new();

/// Suffix shared by every table created in this test run.
static RUN_ID: LazyLock<String> =
    LazyLock::new(|| uuid::Uuid::new_v4().to_string()[..8].to_owned());

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A table name unique to this test run.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    format!("test-{prefix}-{}", *RUN_ID)
}

/// A mapper over its own registry and sequence table.
#[derive(Debug)]
pub struct Harness {
    /// The mapper under test.
    pub mapper: DynamoMapper,
    sequence_table: String,
}

impl Harness {
    /// Connect to the endpoint from `DYNOMAP_ENDPOINT`.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        init_tracing();

        let transport = HttpTransport::new(HttpTransportConfig::from_env())
            .unwrap_or_else(|e| panic!("failed to build transport: {e}"));
        let config = MapperConfig::builder()
            .poll_table_status(Duration::from_millis(200))
            .table_ready_timeout(Some(Duration::from_secs(60)))
            .build();
        let mapper = DynamoMapper::with_registry(
            Arc::new(transport),
            config,
            Arc::new(MetadataRegistry::new()),
        );

        let sequence_table = test_table_name(&format!("{prefix}-seq"));
        let sequences = DynamoSequenceSource::new(
            mapper.executor().clone(),
            (1, 1),
            Duration::from_millis(200),
        )
        .with_table(sequence_table.clone());

        Self {
            mapper: mapper.with_sequences(Arc::new(sequences)),
            sequence_table,
        }
    }

    /// Delete the registered tables and the sequence table.
    pub async fn cleanup(self) {
        let mut names: Vec<String> = self
            .mapper
            .registry()
            .tables()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        names.push(self.sequence_table);
        if let Err(e) = self.mapper.delete_tables(&names).await {
            tracing::warn!(error = %e, "failed to clean up test tables");
        }
    }
}

mod test_items;
mod test_query;
mod test_related;
mod test_tables;
