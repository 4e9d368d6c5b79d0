use thiserror::Error;

/// Errors returned by a [`crate::gateway::KvGateway`] implementation.
///
/// Every backing-store call collapses to one of these three shapes so the
/// lock client can branch on them without knowing anything about the
/// concrete store behind the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// `get` found no row for the given name.
    #[error("no record found for `{0}`")]
    NotFound(String),

    /// A conditional write's expectation did not hold against the stored
    /// value. Not retryable in the same form; the caller must re-read.
    #[error("conditional check failed for `{0}`")]
    Precondition(String),

    /// The call could not be completed against the store at all (network,
    /// throttling, auth, ...). Distinct from [`GatewayError::Precondition`]:
    /// retrying the exact same call may succeed.
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}
