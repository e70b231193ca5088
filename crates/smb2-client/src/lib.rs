//! smb2-client
//!
//! Async client transport engine. A [`Connection`] assigns message ids,
//! writes compound batches in one transport write, keeps a single frame read
//! outstanding while requests are pending, and routes each response PDU to
//! its request by message id. Transport and framing failures fail every
//! pending request.
//!
//! Dialect negotiation, authentication, signing algorithms and credit
//! accounting belong to the layers above.

pub mod config;
pub mod connection;
mod demux;
pub mod error;
pub mod request;
pub mod transport;
pub mod types;

pub use config::{Config, ConfigError};
pub use connection::Connection;
pub use error::ClientError;
pub use request::{PendingRequest, Request, Response};
pub use types::{Identity, Outcome};
