//! Account endpoints: register, login, logout.

use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::{Credentials, NewAccount};

use crate::{
    ServerError,
    server::{ServerState, SessionToken},
    types::auth::{Login, Register, SessionView},
    views::session_view,
};

pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<Register>,
) -> Result<(StatusCode, Json<SessionView>), ServerError> {
    let mut account = NewAccount::new(payload.username, payload.display_name, payload.password);
    if let Some(email) = payload.email {
        account = account.email(email);
    }
    let session = state.engine.register(account).await?;
    Ok((StatusCode::CREATED, Json(session_view(session))))
}

pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<Login>,
) -> Result<Json<SessionView>, ServerError> {
    let session = state
        .engine
        .login(Credentials::new(payload.username, payload.password))
        .await?;
    Ok(Json(session_view(session)))
}

pub async fn logout(
    Extension(SessionToken(token)): Extension<SessionToken>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ServerError> {
    state.engine.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
