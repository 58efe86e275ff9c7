//! Library error taxonomy.
//!
//! Only two classes of failure reach the caller: protocol violations
//! (management calls from inside a callback, a circular aggregation chain
//! discovered during destruction) and permanent bridge failures during
//! discovery. Transient bridge errors never surface — the owning device
//! transitions to disconnected and retries on its next update. Capability
//! mismatches (unsupported force kind, missing motor, writes to orphaned
//! forces) are reported as "not done" return values with no side effects,
//! not as errors.

use thiserror::Error;

use crate::bridge::BridgeError;

/// Errors surfaced by the management API.
#[derive(Debug, Error)]
pub enum Error {
    /// A management-API operation was invoked from inside a callback. The
    /// offending operation is named so the callback can be found.
    #[error("illegal call to management API from within a callback: {operation}")]
    ReentrantCall {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Cascade destruction did not converge, which means a circular chain of
    /// aggregates exists. Creating such a chain is documented as undefined
    /// behavior; this error is the defensive report when it is detected.
    #[error("aggregate destruction did not converge; a circular aggregation chain exists")]
    AggregateCycle,

    /// A permanent bridge failure during discovery, such as missing
    /// permission to open input nodes.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
