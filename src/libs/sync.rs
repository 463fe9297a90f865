pub mod chat_session;
pub mod chat_sync;

use crate::libs::api::api_traits::ApiError;
use crate::libs::realtime::RealtimeError;
use crate::libs::storage::storage_traits::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),
    #[error("Api Error: {0}")]
    Api(#[from] ApiError),
    #[error("Realtime Error: {0}")]
    Realtime(#[from] RealtimeError),
    #[error("No user is logged in")]
    NotAuthenticated,
}
