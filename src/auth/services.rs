use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    error::{AuthError, AuthResult},
    password::{hash_password, verify_decoy, verify_password},
    repo::UserRepo,
    repo_types::{ConfirmedUser, PendingUser},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Open a pending registration. Only confirmed accounts block an email; a
/// previous pending registration for it is replaced.
pub async fn register(
    repo: &dyn UserRepo,
    name: &str,
    email: &str,
    password: &str,
) -> AuthResult<PendingUser> {
    let name = name.trim();
    let email = normalize_email(email);

    if name.is_empty() {
        return Err(AuthError::InvalidInput("Name is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AuthError::InvalidInput("Invalid email".into()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("Password is required".into()));
    }

    if repo.find_user_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(password)?;
    let pending = repo.create_pending(name, &email, &hash).await?;
    info!(pending_id = %pending.id, email = %pending.email, "registration pending");
    Ok(pending)
}

pub async fn login(repo: &dyn UserRepo, email: &str, password: &str) -> AuthResult<ConfirmedUser> {
    let email = normalize_email(email);

    let Some(user) = repo.find_user_by_email(&email).await? else {
        verify_decoy(password);
        warn!(%email, "login unknown email");
        return Err(AuthError::AuthFailed);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AuthError::AuthFailed);
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(user)
}

pub async fn find_user(repo: &dyn UserRepo, id: Uuid) -> AuthResult<ConfirmedUser> {
    repo.find_user_by_id(id)
        .await?
        .ok_or(AuthError::Unauthenticated)
}
