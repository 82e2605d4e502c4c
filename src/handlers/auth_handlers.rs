use axum::{
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use tracing::{instrument, debug, info, warn};

use crate::auth::{self, AuthUser, MIN_PASSWORD_LEN};
use crate::dto::{LoginDto, PasswordFormDto, RegisterDto, TokenDto, UserDto};
use crate::errors::ApiError;
use crate::models::{User, UserRole};
use crate::repo;
use crate::AppState;

/// Handler for creating a learner account
///
/// This function handles POST requests to `/auth/register`.
///
/// ### Returns
///
/// The new account, with role USER, no XP and level 1
///
/// ### Errors
///
/// - `Validation` if the email is malformed or the password too short
/// - `Conflict` if the email is already registered
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<RegisterDto>,
) -> Result<Json<UserDto>, ApiError> {
    let email = repo::normalize_email(&payload.email);
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if repo::get_user_by_email(&state.pool, &email)?.is_some() {
        warn!("Registration attempted with an existing email");
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let hashed = auth::hash_password(&payload.password)?;
    let full_name = payload.full_name.filter(|name| !name.trim().is_empty());
    let user = repo::create_user(&state.pool, User::new(email, hashed, full_name, UserRole::User))?;

    info!("Registered user {}", user.get_id());
    Ok(Json(UserDto::from(&user)))
}

/// Login credentials sent as JSON or as an OAuth2 password form
#[derive(Debug)]
pub struct LoginCredentials(pub LoginDto);

impl<S: Send + Sync> FromRequest<S> for LoginCredentials {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(form) = Form::<PasswordFormDto>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(LoginDto { email: form.username, password: form.password }))
        } else {
            let Json(dto) = Json::<LoginDto>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(dto))
        }
    }
}

/// Handler for exchanging credentials for a bearer token
///
/// This function handles POST requests to `/auth/login`, with either a JSON
/// body or a form whose `username` is the email.
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login_handler(
    State(state): State<AppState>,
    LoginCredentials(payload): LoginCredentials,
) -> Result<Json<TokenDto>, ApiError> {
    let rejected = || ApiError::Unauthorized("Incorrect email or password".to_string());

    let user = repo::get_user_by_email(&state.pool, &repo::normalize_email(&payload.email))?
        .ok_or_else(rejected)?;
    if !auth::verify_password(&payload.password, user.get_hashed_password()) {
        warn!("Login failed for user {}", user.get_id());
        return Err(rejected());
    }
    if !user.is_active() {
        return Err(ApiError::Unauthorized("Inactive user".to_string()));
    }

    let access_token = state.tokens.sign(&user)?;
    debug!("Issued token for user {}", user.get_id());
    Ok(Json(TokenDto {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// Handler for reading the caller's own account
///
/// This function handles GET requests to `/auth/me`.
#[instrument(skip(auth), fields(user_id = %auth.id()))]
pub async fn me_handler(auth: AuthUser) -> Json<UserDto> {
    Json(UserDto::from(auth.user()))
}
