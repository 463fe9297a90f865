pub mod channel;
pub mod codec;
pub mod events;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RealtimeError {
    #[error("Socket Connect Error: {0}")]
    Connect(String),
    #[error("Socket Protocol Error: {0}")]
    Protocol(String),
    #[error("Socket Closed")]
    Closed,
}
