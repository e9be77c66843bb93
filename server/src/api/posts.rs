use super::created;
use super::extract::{AuthUser, FormInput, Viewer};
use super::resources::Resource;
use crate::app::AppState;
use crate::database::filter::POST_FILTER;
use crate::database::QueryFilter;
use crate::error::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let filter = QueryFilter::from_params(&POST_FILTER, &params);
    let posts = state.posts.list_posts(viewer.visibility(), &filter).await?;

    Ok(Resource::new(&posts)?
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn store(
    State(state): State<AppState>,
    _auth: AuthUser,
    FormInput(input): FormInput,
) -> Result<impl IntoResponse> {
    let post = state.posts.create_post(&input).await?;
    Ok(created(post.id))
}

pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let post = state.posts.get_post(id, viewer.visibility()).await?;

    Ok(Resource::new(&post)?
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    FormInput(input): FormInput,
) -> Result<Json<Value>> {
    let post = state.posts.update_post(id, &input).await?;
    Ok(Resource::new(&post)?.into_json())
}

pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.posts.delete_post(id, auth.visibility()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn force_destroy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.posts.force_delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
