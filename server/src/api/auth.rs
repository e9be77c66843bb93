use super::extract::{AuthUser, FormInput};
use crate::app::AppState;
use crate::error::Result;
use crate::services::IssuedToken;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub async fn login(
    State(state): State<AppState>,
    FormInput(input): FormInput,
) -> Result<Json<IssuedToken>> {
    let token = state.auth.login(&input).await?;
    Ok(Json(token))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode> {
    state.auth.logout(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn info(auth: AuthUser) -> Json<Value> {
    Json(json!({
        "id": auth.user.id,
        "username": auth.user.username,
    }))
}
