//! Distributed advisory lock client backed by a conditional-write key/value
//! store (canonically DynamoDB).
//!
//! # Example
//! ```
//! # async fn foo() -> anyhow::Result<()> {
//! # let dynamodb_client: aws_sdk_dynamodb::Client = unimplemented!();
//! let client = dynamodb_lock::Client::builder()
//!     .table_name("example-locks")
//!     .build(dynamodb_client)
//!     .await?;
//!
//! client.startup();
//!
//! // acquire a lock for "important-job-123", waiting for any other holder
//! // to release or expire
//! let lock = client.acquire("important-job-123", None).await;
//! assert!(lock.is_some());
//!
//! // until released others cannot take it
//! assert!(client.try_acquire("important-job-123", None).await.is_none());
//!
//! client.release(&lock.unwrap(), None).await;
//! # Ok(()) }
//! ```

mod builder;
mod cache;
mod client;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod gateway;
mod guard;
mod policy;
mod record;
mod schema;
mod value;
mod worker;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::GatewayError;
pub use gateway::KvGateway;
pub use guard::LockGuard;
pub use policy::{DefaultPolicy, Policy};
pub use record::Lock;
pub use schema::Schema;
pub use value::{Attributes, Value};
