//! One-time codes proving control of the email address of a pending registration.
//!
//! Lifecycle of a pending row: no code → code issued (each `issue` replaces the
//! previous code) → either promoted to a confirmed account on a matching code, or
//! deleted by the first verification attempt made after expiry. Expiry is only
//! checked when someone verifies; stale rows are left in place until then.

use std::sync::Arc;

use axum::extract::FromRef;
use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        error::{AuthError, AuthResult},
        repo::UserRepo,
        repo_types::ConfirmedUser,
    },
    config::OtpConfig,
    mail::Notifier,
    state::AppState,
};

const SUBJECT: &str = "Your OTP";

#[derive(Clone)]
pub struct OtpVerifier {
    repo: Arc<dyn UserRepo>,
    notifier: Arc<dyn Notifier>,
    length: usize,
    ttl: Duration,
}

impl FromRef<AppState> for OtpVerifier {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.notifier.clone(), &state.config.otp)
    }
}

impl OtpVerifier {
    pub fn new(repo: Arc<dyn UserRepo>, notifier: Arc<dyn Notifier>, cfg: &OtpConfig) -> Self {
        Self {
            repo,
            notifier,
            length: cfg.length,
            ttl: Duration::seconds(cfg.ttl_seconds),
        }
    }

    pub async fn issue(&self, email: &str) -> AuthResult<OffsetDateTime> {
        self.issue_at(email, OffsetDateTime::now_utc()).await
    }

    /// Store a fresh code on the pending registration and mail it. The code is
    /// stored before delivery, so it stays valid when sending fails.
    #[instrument(skip(self, now))]
    pub async fn issue_at(&self, email: &str, now: OffsetDateTime) -> AuthResult<OffsetDateTime> {
        let pending = self
            .repo
            .find_pending_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let code = generate_code(self.length);
        let expires_at = now + self.ttl;
        if !self.repo.set_pending_otp(pending.id, &code, expires_at).await? {
            return Err(AuthError::NotFound);
        }

        let body = format!(
            "This is your OTP: {code}\n\nIt expires in {} minutes.",
            self.ttl.whole_minutes().max(1)
        );
        if let Err(e) = self.notifier.send(&pending.email, SUBJECT, &body).await {
            warn!(pending_id = %pending.id, error = ?e, "otp delivery failed");
            return Err(AuthError::DeliveryFailed(e.to_string()));
        }

        info!(pending_id = %pending.id, %expires_at, "otp issued");
        Ok(expires_at)
    }

    pub async fn verify(&self, email: &str, submitted: &str) -> AuthResult<ConfirmedUser> {
        self.verify_at(email, submitted, OffsetDateTime::now_utc()).await
    }

    #[instrument(skip(self, submitted, now))]
    pub async fn verify_at(
        &self,
        email: &str,
        submitted: &str,
        now: OffsetDateTime,
    ) -> AuthResult<ConfirmedUser> {
        let pending = self
            .repo
            .find_pending_by_email(email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let (code, expires_at) = pending.issued_code().ok_or(AuthError::NoCodeIssued)?;

        if now > expires_at {
            if self.repo.delete_expired_pending(pending.id, expires_at).await? {
                warn!(pending_id = %pending.id, %expires_at, "otp expired; pending registration removed");
                return Err(AuthError::Expired);
            }
            // A fresh code replaced the expired one; the submitted code was
            // checked against neither.
            return match self.repo.find_pending_by_id(pending.id).await? {
                Some(_) => Err(AuthError::InvalidCode),
                None => Err(AuthError::NotFound),
            };
        }

        if !codes_match(code, submitted.trim()) {
            warn!(pending_id = %pending.id, "otp mismatch");
            return Err(AuthError::InvalidCode);
        }

        match self.repo.promote_pending(pending.id, code).await? {
            Some(user) => {
                info!(user_id = %user.id, pending_id = %pending.id, "registration confirmed");
                Ok(user)
            }
            // Lost a race: another verify promoted the row or a new code replaced ours.
            None => match self.repo.find_pending_by_id(pending.id).await? {
                Some(_) => Err(AuthError::InvalidCode),
                None => Err(AuthError::NotFound),
            },
        }
    }
}

/// Numeric code of `length` digits drawn from the OS RNG.
pub fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn codes_match(stored: &str, submitted: &str) -> bool {
    stored.len() == submitted.len()
        && stored
            .bytes()
            .zip(submitted.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
