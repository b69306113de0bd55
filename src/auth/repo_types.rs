use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Registration awaiting email confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2 hash, carried over on promotion.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Latest issued code.
    #[serde(skip_serializing)]
    pub otp: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl PendingUser {
    /// Stored code and its expiry, if a code has been issued.
    pub fn issued_code(&self) -> Option<(&str, OffsetDateTime)> {
        match (self.otp.as_deref(), self.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some((code, expires_at)),
            _ => None,
        }
    }
}

/// Account that passed OTP verification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConfirmedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}
