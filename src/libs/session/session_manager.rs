use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::storage_traits::{SettingsStore, StoreError};
use std::sync::Arc;
use tracing::info;

const AUTH_TOKEN_KEY: &str = "auth_token";
const USER_ID_KEY: &str = "user_id";
const ONBOARDING_COMPLETE_KEY: &str = "onboarding_complete";

/// The logged-in user, persisted in `app_settings`.
#[derive(Clone, Debug)]
pub struct SessionManager {
    store: Arc<SqliteStore>,
}

impl SessionManager {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    pub fn save_auth_token(&self, token: &str) -> Result<(), StoreError> {
        self.store.with_transaction(|tx| tx.store_setting(AUTH_TOKEN_KEY, token))
    }

    pub fn save_user_id(&self, user_id: &str) -> Result<(), StoreError> {
        self.store.with_transaction(|tx| tx.store_setting(USER_ID_KEY, user_id))
    }

    pub fn save_onboarding_complete(&self, complete: bool) -> Result<(), StoreError> {
        let value = if complete { "true" } else { "false" };
        self.store
            .with_transaction(|tx| tx.store_setting(ONBOARDING_COMPLETE_KEY, value))
    }

    pub fn auth_token(&self) -> Result<Option<String>, StoreError> {
        self.store.with_transaction(|tx| tx.load_setting(AUTH_TOKEN_KEY))
    }

    pub fn user_id(&self) -> Result<Option<String>, StoreError> {
        self.store.with_transaction(|tx| tx.load_setting(USER_ID_KEY))
    }

    pub fn is_onboarding_complete(&self) -> Result<bool, StoreError> {
        let value = self
            .store
            .with_transaction(|tx| tx.load_setting(ONBOARDING_COMPLETE_KEY))?;
        Ok(value.as_deref() == Some("true"))
    }

    pub fn is_logged_in(&self) -> Result<bool, StoreError> {
        Ok(self.auth_token()?.is_some())
    }

    /// Forgets the user. Cached conversations and messages are kept.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.store.with_transaction(|tx| {
            for key in [AUTH_TOKEN_KEY, USER_ID_KEY, ONBOARDING_COMPLETE_KEY] {
                tx.delete_setting(key)?;
            }
            Ok(())
        })?;
        info!("Session cleared");
        Ok(())
    }
}
