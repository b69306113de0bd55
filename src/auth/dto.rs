use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::ConfirmedUser;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Returned after registration; `pending_id` goes back in with the code.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub pending_id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub otp_expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResendOtpResponse {
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub otp_expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub id: Uuid,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<ConfirmedUser> for PublicUser {
    fn from(u: ConfirmedUser) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: PublicUser,
}
