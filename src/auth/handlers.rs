use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::{error, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, ChangePasswordRequest, CredentialsRequest, UserEnvelope},
        extractors::{AuthUser, AUTH_HEADER},
        repo_types::User,
    },
    error::{AppError, AppJson},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(get_me))
        .route("/users/me/token", delete(logout))
        .route("/users/me/password", patch(change_password))
}

/// Token goes out in the `x-auth` header and in the body.
fn session_response(user: User, token: String) -> impl IntoResponse {
    (
        [(AUTH_HEADER, token.clone())],
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) = state.auth.register(&payload.email, &payload.password).await?;
    Ok(session_response(user, token))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) = state.auth.login(&payload.email, &payload.password).await?;
    Ok(session_response(user, token))
}

#[instrument(skip_all, fields(user_id = %caller.user.id))]
pub async fn get_me(caller: AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: caller.user.into(),
    })
}

#[instrument(skip_all, fields(user_id = %caller.user.id))]
pub async fn logout(State(state): State<AppState>, caller: AuthUser) -> StatusCode {
    match state.auth.logout(caller.user.id, &caller.token).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, "logout failed");
            StatusCode::BAD_REQUEST
        }
    }
}

#[instrument(skip_all, fields(user_id = %caller.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .change_password(caller.user.id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
