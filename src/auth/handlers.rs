use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
            SessionStatus,
        },
        extractors::{clear_session_cookie, session_cookie, MaybeUser},
        guard::Role,
        jwt::JwtKeys,
        password::{hash_password, is_valid_email, verify_password, MIN_PASSWORD_LEN},
        repo_types::User,
    },
    error::{is_unique_violation, AppError},
    extract::ApiJson,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/check-session", get(check_session))
}

const DUPLICATE_USER: &str = "Username or email already exists";

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation("Password too short".into()));
    }

    if User::username_or_email_taken(&state.db, &payload.username, &payload.email).await? {
        warn!("username or email already registered");
        return Err(AppError::Conflict(DUPLICATE_USER.into()));
    }

    let hash = hash_password(&payload.password)?;
    let role = if state.config.is_bootstrap_admin(&payload.username) {
        Role::Admin
    } else {
        Role::Student
    };

    // a concurrent registration can still win the race; the unique index decides
    let user = User::create(&state.db, &payload.username, &payload.email, &hash, role.as_str())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(DUPLICATE_USER.into())
            } else {
                AppError::from(e)
            }
        })?;

    info!(user_id = user.id, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>), AppError> {
    let username = payload.username.trim();

    let Some(user) = User::find_by_username(&state.db, username).await? else {
        warn!("login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.username)?;

    let mut headers = HeaderMap::new();
    let cookie = session_cookie(&token, keys.ttl.as_secs(), state.config.cookie_secure);
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(anyhow::Error::from)?,
    );

    info!(user_id = user.id, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            success: true,
            username: user.username,
            token,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<LogoutResponse>), AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_session_cookie(state.config.cookie_secure))
            .map_err(anyhow::Error::from)?,
    );
    Ok((headers, Json(LogoutResponse { success: true })))
}

pub async fn check_session(MaybeUser(identity): MaybeUser) -> Json<SessionStatus> {
    Json(SessionStatus {
        is_logged_in: identity.is_some(),
        username: identity.map(|i| i.username),
    })
}
