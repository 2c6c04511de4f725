use thiserror::Error;

use crate::num::ParseAmountError;

/// Failures of the event-bus transport, as seen by the processing loop.
///
/// The variants drive the retry strategy: [`StreamError::ConnectionNotReady`]
/// makes the loop redial the underlying connection before resubscribing, any
/// other variant is retried with a fixed backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The underlying node connection is not established.
    #[error("node connection not ready")]
    ConnectionNotReady,
    /// The stream opened but the subscription filter could not be sent.
    #[error("failed to send subscription filter: {0}")]
    Subscribe(String),
    /// Generic transport failure while opening or reading a stream.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The server closed an established stream.
    #[error("event stream closed: {0}")]
    Closed(String),
}

/// Terminal outcome of a condition wait.
///
/// `Clone` on purpose: one resolution fans out to every waiter coalesced onto
/// the same pending top-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// A deposit or transfer for the awaited key reached a failed status.
    #[error("transfer {id} failed: {status}: {reason}")]
    TransferFailed {
        id: String,
        status: String,
        reason: String,
    },
    /// Stake linking reached a terminal status other than accepted.
    #[error("stake linking failed: {status}")]
    StakeLinkingFailed { status: String },
    /// An event carried a balance or amount that could not be parsed.
    #[error(transparent)]
    BadAmount(#[from] ParseAmountError),
    #[error("timed out waiting for top-up")]
    TopUpTimedOut,
    #[error("timed out waiting for stake linking")]
    StakeLinkingTimedOut,
}

impl WaitError {
    /// Whether the wait failed because time ran out rather than because the
    /// chain rejected something. Timeouts are worth retrying, rejections are
    /// not.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            WaitError::TopUpTimedOut | WaitError::StakeLinkingTimedOut
        )
    }
}
