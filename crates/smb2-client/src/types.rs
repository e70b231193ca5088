use bytes::Bytes;
use smb2_core::MessageId;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};

use crate::error::ClientError;
use crate::request::Response;

/// What a pending request eventually resolves to.
pub type Outcome = Result<Response, ClientError>;

pub(crate) type OutcomeTx = oneshot::Sender<Outcome>;
pub(crate) type OutcomeRx = oneshot::Receiver<Outcome>;

/// Type-erased halves of the connection's byte stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One compound batch, already framed, queued for the writer task.
#[derive(Debug)]
pub(crate) struct WriteJob {
    pub first_id: MessageId,
    pub segments: Vec<Bytes>,
}

pub(crate) type WriteTx = mpsc::UnboundedSender<WriteJob>;
pub(crate) type WriteRx = mpsc::UnboundedReceiver<WriteJob>;

/// Session identity stamped into every request the connection creates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub process_id: u32,
    pub tree_id: u32,
    pub session_id: u64,
}
