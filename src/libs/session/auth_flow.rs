use crate::libs::api::api_traits::{ApiError, DatingApi};
use crate::libs::api::dto::UserInfo;
use crate::libs::session::session_manager::SessionManager;
use crate::libs::storage::storage_traits::StoreError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const OTP_MAX_LEN: usize = 6;
const OTP_SUCCESS: &str = "success";
const NEW_USER_NAME: &str = "New User";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("OTP rejected: {0}")]
    OtpRejected(String),
    #[error("OTP must be at most 6 characters, got {0}")]
    InvalidOtp(usize),
    #[error("Api Error: {0}")]
    Api(#[from] ApiError),
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedUser {
    pub user: UserInfo,
    /// The server names freshly created accounts "New User".
    pub needs_onboarding: bool,
}

/// Normalises user input to E.164, assuming an Indian number when no country code is given.
pub fn format_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.starts_with("91") {
        format!("+{}", digits)
    } else if digits.len() == 10 {
        format!("+91{}", digits)
    } else {
        format!("+{}", digits)
    }
}

pub struct AuthFlow<A: DatingApi> {
    api: Arc<A>,
    session: SessionManager,
}

impl<A: DatingApi> AuthFlow<A> {
    pub fn new(api: Arc<A>, session: SessionManager) -> Self {
        Self { api, session }
    }

    /// Returns the formatted number the code was sent to.
    pub async fn send_otp(&self, phone_number: &str) -> Result<String, AuthError> {
        let phone_number = format_phone_number(phone_number);
        let response = self.api.send_otp(&phone_number).await?;

        if response.kind != OTP_SUCCESS {
            warn!(kind = %response.kind, "OTP request rejected");
            let reason = if response.message.is_empty() {
                "Failed to send OTP".to_string()
            } else {
                response.message
            };
            return Err(AuthError::OtpRejected(reason));
        }
        Ok(phone_number)
    }

    /// Verifies the code and stores the session on success.
    pub async fn verify_otp(&self, phone_number: &str, otp: &str) -> Result<VerifiedUser, AuthError> {
        let otp_len = otp.chars().count();
        if otp_len > OTP_MAX_LEN {
            return Err(AuthError::InvalidOtp(otp_len));
        }

        let phone_number = format_phone_number(phone_number);
        let response = self.api.verify_otp(&phone_number, otp).await?;

        self.session.save_auth_token(&response.access_token)?;
        self.session.save_user_id(&response.user.id)?;

        let needs_onboarding = response.user.name == NEW_USER_NAME;
        info!(user_id = %response.user.id, needs_onboarding, "Logged in");
        Ok(VerifiedUser {
            user: response.user,
            needs_onboarding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("98765 43210"), "+919876543210");
        assert_eq!(format_phone_number("+91 98765-43210"), "+919876543210");
        assert_eq!(format_phone_number("(415) 555-0100 1"), "+41555501001");
        assert_eq!(format_phone_number("4155550100"), "+914155550100");
        assert_eq!(format_phone_number("1 415 555 0100"), "+14155550100");
    }
}
