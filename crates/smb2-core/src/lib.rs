//! smb2-core
//!
//! Pure client engine logic, no I/O:
//! - NT status codes and transport error mapping
//! - message ids and the per-connection id counter
//! - the pending-request set and its empty/non-empty transitions

pub mod error;
pub mod message_id;
pub mod pending;
pub mod status;

pub use error::CoreError;
pub use message_id::{MessageId, MessageIdCounter};
pub use pending::{PendingSet, Transition};
pub use status::NtStatus;
