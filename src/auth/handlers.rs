use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            DashboardResponse, LoginRequest, PublicUser, RegisterRequest, RegisterResponse,
            ResendOtpRequest, ResendOtpResponse, VerifyRequest,
        },
        error::{AuthError, AuthResult},
        otp::OtpVerifier,
        services::{self, normalize_email},
        session::{SessionKeys, SessionUser},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/otp/resend", post(resend_otp))
        .route("/auth/verify", post(verify))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

#[instrument(skip(state, otp, payload))]
pub async fn register(
    State(state): State<AppState>,
    State(otp): State<OtpVerifier>,
    Json(payload): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<RegisterResponse>)> {
    if payload.password != payload.confirm_password {
        warn!("password confirmation mismatch");
        return Err(AuthError::InvalidInput("Passwords do not match".into()));
    }

    let pending = services::register(
        state.users.as_ref(),
        &payload.name,
        &payload.email,
        &payload.password,
    )
    .await?;

    let otp_expires_at = otp.issue(&pending.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            pending_id: pending.id,
            email: pending.email,
            otp_expires_at,
        }),
    ))
}

#[instrument(skip(otp, payload))]
pub async fn resend_otp(
    State(otp): State<OtpVerifier>,
    Json(payload): Json<ResendOtpRequest>,
) -> AuthResult<(StatusCode, Json<ResendOtpResponse>)> {
    let email = normalize_email(&payload.email);
    let otp_expires_at = otp.issue(&email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ResendOtpResponse {
            email,
            otp_expires_at,
        }),
    ))
}

#[instrument(skip(state, otp, payload))]
pub async fn verify(
    State(state): State<AppState>,
    State(otp): State<OtpVerifier>,
    Json(payload): Json<VerifyRequest>,
) -> AuthResult<Json<PublicUser>> {
    let pending = state
        .users
        .find_pending_by_id(payload.id)
        .await?
        .ok_or(AuthError::NotFound)?;

    let user = otp.verify(&pending.email, &payload.otp).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, keys, payload))]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<SessionKeys>,
    Json(payload): Json<LoginRequest>,
) -> AuthResult<(HeaderMap, Json<PublicUser>)> {
    let user = services::login(state.users.as_ref(), &payload.email, &payload.password).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, keys.login_cookie(user.id)?);
    Ok((headers, Json(user.into())))
}

pub async fn logout(State(keys): State<SessionKeys>) -> (StatusCode, HeaderMap) {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, keys.logout_cookie());
    (StatusCode::NO_CONTENT, headers)
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> AuthResult<Json<DashboardResponse>> {
    let user = services::find_user(state.users.as_ref(), user_id).await?;
    info!(user_id = %user.id, "dashboard");
    Ok(Json(DashboardResponse { user: user.into() }))
}
