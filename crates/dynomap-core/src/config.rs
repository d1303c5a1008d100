//! Mapper configuration.
//!
//! Provides [`MapperConfig`], the knobs consumed by the converters, the
//! expression compiler, the retry harness and the table lifecycle helpers.
//! Values can be loaded from `DYNOMAP_*` environment variables.

use std::time::Duration;

use dynomap_model::DynamoDBErrorCode;
use typed_builder::TypedBuilder;

use crate::expression::ReservedWords;

/// Error codes retried by default.
pub const DEFAULT_RETRY_ON_ERROR_CODES: [DynamoDBErrorCode; 4] = [
    DynamoDBErrorCode::ThrottlingException,
    DynamoDBErrorCode::ProvisionedThroughputExceededException,
    DynamoDBErrorCode::LimitExceededException,
    DynamoDBErrorCode::ResourceInUseException,
];

/// Mapper configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dynomap_core::config::MapperConfig;
///
/// let config = MapperConfig::builder()
///     .max_retry_timeout(Duration::from_secs(5))
///     .build();
/// assert!(config.consistent_read);
/// assert_eq!(config.paging_limit, 1000);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct MapperConfig {
    /// Whether single-item reads and queries are strongly consistent.
    #[builder(default = true)]
    pub consistent_read: bool,

    /// Default sort order for queries.
    #[builder(default = true)]
    pub scan_index_forward: bool,

    /// Page size requested from `Query`/`Scan`.
    #[builder(default = 1000)]
    pub paging_limit: i32,

    /// Read capacity for tables that do not declare their own.
    #[builder(default = 10)]
    pub read_capacity_units: i64,

    /// Write capacity for tables that do not declare their own.
    #[builder(default = 5)]
    pub write_capacity_units: i64,

    /// Wall-clock budget for retrying a transient failure.
    #[builder(default = Duration::from_secs(60))]
    pub max_retry_timeout: Duration,

    /// Interval between `DescribeTable`/`ListTables` polls.
    #[builder(default = Duration::from_secs(2))]
    pub poll_table_status: Duration,

    /// Give up waiting for tables after this long. `None` waits forever.
    #[builder(default)]
    pub table_ready_timeout: Option<Duration>,

    /// First retry delay. Doubles on every attempt.
    #[builder(default = Duration::from_millis(100))]
    pub base_backoff: Duration,

    /// Upper bound of a single retry delay.
    #[builder(default = Duration::from_secs(10))]
    pub max_backoff: Duration,

    /// Client error codes considered transient.
    #[builder(default = DEFAULT_RETRY_ON_ERROR_CODES.to_vec())]
    pub retry_on_error_codes: Vec<DynamoDBErrorCode>,

    /// Skip null attributes when writing items.
    #[builder(default = false)]
    pub exclude_null_values: bool,

    /// Store enums as their ordinal instead of their name.
    #[builder(default = false)]
    pub enum_as_int: bool,

    /// Words that must be aliased in expressions.
    #[builder(default)]
    pub reserved_words: ReservedWords,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            consistent_read: true,
            scan_index_forward: true,
            paging_limit: 1000,
            read_capacity_units: 10,
            write_capacity_units: 5,
            max_retry_timeout: Duration::from_secs(60),
            poll_table_status: Duration::from_secs(2),
            table_ready_timeout: None,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            retry_on_error_codes: DEFAULT_RETRY_ON_ERROR_CODES.to_vec(),
            exclude_null_values: false,
            enum_as_int: false,
            reserved_words: ReservedWords::default(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNOMAP_CONSISTENT_READ` | `true` |
    /// | `DYNOMAP_SCAN_INDEX_FORWARD` | `true` |
    /// | `DYNOMAP_PAGING_LIMIT` | `1000` |
    /// | `DYNOMAP_READ_CAPACITY_UNITS` | `10` |
    /// | `DYNOMAP_WRITE_CAPACITY_UNITS` | `5` |
    /// | `DYNOMAP_MAX_RETRY_TIMEOUT_MS` | `60000` |
    /// | `DYNOMAP_POLL_TABLE_STATUS_MS` | `2000` |
    /// | `DYNOMAP_TABLE_READY_TIMEOUT_MS` | unset |
    /// | `DYNOMAP_BASE_BACKOFF_MS` | `100` |
    /// | `DYNOMAP_MAX_BACKOFF_MS` | `10000` |
    /// | `DYNOMAP_EXCLUDE_NULL_VALUES` | `false` |
    /// | `DYNOMAP_ENUM_AS_INT` | `false` |
    ///
    /// Unparseable numbers are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNOMAP_CONSISTENT_READ") {
            config.consistent_read = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DYNOMAP_SCAN_INDEX_FORWARD") {
            config.scan_index_forward = parse_bool(&v);
        }
        if let Some(n) = env_parse("DYNOMAP_PAGING_LIMIT") {
            config.paging_limit = n;
        }
        if let Some(n) = env_parse("DYNOMAP_READ_CAPACITY_UNITS") {
            config.read_capacity_units = n;
        }
        if let Some(n) = env_parse("DYNOMAP_WRITE_CAPACITY_UNITS") {
            config.write_capacity_units = n;
        }
        if let Some(ms) = env_parse("DYNOMAP_MAX_RETRY_TIMEOUT_MS") {
            config.max_retry_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("DYNOMAP_POLL_TABLE_STATUS_MS") {
            config.poll_table_status = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("DYNOMAP_TABLE_READY_TIMEOUT_MS") {
            config.table_ready_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse("DYNOMAP_BASE_BACKOFF_MS") {
            config.base_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse("DYNOMAP_MAX_BACKOFF_MS") {
            config.max_backoff = Duration::from_millis(ms);
        }
        if let Ok(v) = std::env::var("DYNOMAP_EXCLUDE_NULL_VALUES") {
            config.exclude_null_values = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DYNOMAP_ENUM_AS_INT") {
            config.enum_as_int = parse_bool(&v);
        }

        config
    }

    /// The throughput used for tables that do not declare their own.
    #[must_use]
    pub fn default_throughput(&self) -> (i64, i64) {
        (self.read_capacity_units, self.write_capacity_units)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse a boolean from an environment variable value.
///
/// Accepts `"1"`, `"true"`, `"yes"` (case-insensitive) as `true`.
/// Everything else is `false`.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = MapperConfig::default();
        assert!(config.consistent_read);
        assert!(config.scan_index_forward);
        assert_eq!(config.paging_limit, 1000);
        assert_eq!(config.default_throughput(), (10, 5));
        assert_eq!(config.max_retry_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_on_error_codes.len(), 4);
        assert!(!config.exclude_null_values);
        assert!(config.reserved_words.contains("name"));
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = MapperConfig::builder()
            .enum_as_int(true)
            .paging_limit(25)
            .retry_on_error_codes(vec![DynamoDBErrorCode::ThrottlingException])
            .build();
        assert!(config.enum_as_int);
        assert_eq!(config.paging_limit, 25);
        assert_eq!(config.retry_on_error_codes.len(), 1);
        assert_eq!(config.base_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool(" Yes "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }
}
