use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::UserResponse;
use crate::auth::password::MAX_PASSWORD_BYTES;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// OAuth2 password-grant form. Extra fields (grant_type, scope) are ignored.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// POST /register
/// Create a user. The password is bcrypt-hashed before storage.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(req) = payload?;
    if req.username.trim().is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".to_string()));
    }
    if req.password.is_empty() {
        return Err(AppError::BadRequest("Password cannot be empty".to_string()));
    }
    if req.password.len() > MAX_PASSWORD_BYTES {
        return Err(AppError::BadRequest(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    let users = state.users.clone();
    let credentials = state.credentials;

    let user = tokio::task::spawn_blocking(move || {
        // Look up first so a taken name does not pay for a bcrypt round
        if users.find_by_username(&req.username)?.is_some() {
            return Err(AppError::DuplicateUser);
        }
        let hashed = credentials.hash(&req.password)?;
        users.create(&req.username, &req.email, &hashed)
    })
    .await
    .map_err(AppError::join)?
    .inspect_err(|e| {
        if matches!(e, AppError::DuplicateUser) {
            tracing::warn!("Registration rejected: username already taken");
        }
    })?;

    tracing::info!("User registered: {}", user.username);

    Ok(Json(UserResponse::from(&user)))
}

/// POST /token
/// Exchange username and password for a bearer access token.
pub async fn login_for_access_token(
    State(state): State<AppState>,
    payload: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Form(form) = payload?;
    let users = state.users.clone();
    let credentials = state.credentials;
    let username = form.username.clone();

    let authenticated = tokio::task::spawn_blocking(move || {
        let user = users.find_by_username(&form.username)?;
        // Unknown user and wrong password are indistinguishable to the caller
        Ok::<_, AppError>(
            user.filter(|u| credentials.verify(&form.password, &u.hashed_password)),
        )
    })
    .await
    .map_err(AppError::join)??;

    let Some(user) = authenticated else {
        tracing::warn!("Failed login for {}", username);
        return Err(AppError::InvalidCredentials);
    };

    let access_token = state.tokens.issue(&user.username)?;
    tracing::info!("Issued access token for {}", user.username);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
