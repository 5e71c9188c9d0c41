//! Error type for host object-model operations

/// Error type for calls that cross into the host application
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A host endpoint could not be reached (lookup refused, object gone,
    /// control I/O failed). The payload names the endpoint.
    #[error("host endpoint unavailable: {0}")]
    Unavailable(&'static str),

    /// Removal was requested for a listener token that is not registered.
    #[error("listener is not registered")]
    UnknownListener,
}

/// Convenience alias for host call results
pub type HostResult<T> = Result<T, HostError>;
