//! Error types for the core engine logic.

use std::fmt;

use crate::message_id::MessageId;

/// Errors from the pure bookkeeping layer.
///
/// Both indicate a broken invariant rather than anything the peer did, so
/// callers treat them as a failed submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An id was registered twice while still pending.
    DuplicateMessageId(MessageId),

    /// The connection ran out of assignable message ids.
    MessageIdsExhausted { next: MessageId, requested: usize },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::DuplicateMessageId(id) => {
                write!(f, "message id {} is already pending", id)
            }
            CoreError::MessageIdsExhausted { next, requested } => write!(
                f,
                "message ids exhausted: next id {}, {} requested",
                next, requested
            ),
        }
    }
}

impl std::error::Error for CoreError {}
