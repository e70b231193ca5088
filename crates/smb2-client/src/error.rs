use smb2_core::{CoreError, MessageId, NtStatus};
use smb2_protocol::ProtocolError;
use thiserror::Error;

/// Everything a submit or a receive can fail with.
///
/// `Clone` because a single connection-level failure is handed to every
/// pending request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The transport failed or was closed; carries the mapped status.
    #[error("transport failed: {0}")]
    Transport(NtStatus),

    /// A received frame could not be parsed, or a batch could not be framed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A received frame carried a message id that is not pending.
    #[error("response for message id {0}, which is not pending")]
    UnexpectedMessageId(MessageId),

    /// The response's body-size field differs from what the caller expected.
    #[error("message id {message_id}: body size {actual:#06x}, expected {expected:#06x}")]
    BodySizeMismatch {
        message_id: MessageId,
        expected: u16,
        actual: u16,
    },

    /// The connection was already closed when the batch was submitted.
    #[error("connection is closed")]
    Disconnected,

    #[error("compound submit with no requests")]
    EmptyBatch,

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The completion was dropped without a result.
    #[error("request abandoned without a result")]
    ReaderGone,

    /// No tokio runtime to spawn the connection's tasks on.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl ClientError {
    /// The status this error maps to.
    pub fn status(&self) -> NtStatus {
        match self {
            ClientError::Transport(status) => *status,
            ClientError::Protocol(err) => err.status(),
            ClientError::UnexpectedMessageId(_) | ClientError::BodySizeMismatch { .. } => {
                NtStatus::INVALID_NETWORK_RESPONSE
            }
            ClientError::Disconnected | ClientError::ReaderGone => {
                NtStatus::CONNECTION_DISCONNECTED
            }
            ClientError::EmptyBatch => NtStatus::INVALID_PARAMETER,
            ClientError::Core(CoreError::DuplicateMessageId(_)) => NtStatus::INVALID_PARAMETER,
            ClientError::Core(CoreError::MessageIdsExhausted { .. }) => {
                NtStatus::INSUFFICIENT_RESOURCES
            }
            ClientError::NoRuntime => NtStatus::UNSUCCESSFUL,
        }
    }

    /// True for errors that every pending request on the connection sees.
    pub fn is_connection_wide(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_)
                | ClientError::Protocol(_)
                | ClientError::UnexpectedMessageId(_)
        )
    }
}
