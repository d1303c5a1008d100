//! HTTP transport for dynomap.
//!
//! [`HttpTransport`] speaks the DynamoDB `awsJson1_0` protocol: every
//! operation is a `POST` to the endpoint root with an `X-Amz-Target` header
//! naming the operation and a JSON body. Failed responses are decoded from
//! their `__type`/`Message` body into [`DynamoDBError`](dynomap_model::DynamoDBError).
//!
//! ```no_run
//! use std::sync::Arc;
//! use dynomap_core::DynamoMapper;
//! use dynomap_http::{HttpTransport, HttpTransportConfig};
//!
//! # fn main() -> Result<(), dynomap_model::DynamoDBError> {
//! let transport = HttpTransport::new(HttpTransportConfig::from_env())?;
//! let mapper = DynamoMapper::new(Arc::new(transport));
//! # let _ = mapper;
//! # Ok(())
//! # }
//! ```
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod error;
pub mod transport;

pub use config::HttpTransportConfig;
pub use error::parse_error;
pub use transport::HttpTransport;
