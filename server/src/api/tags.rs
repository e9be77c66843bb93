use super::extract::{AuthUser, FormInput, Viewer};
use super::resources::Resource;
use crate::app::AppState;
use crate::database::filter::TAG_FILTER;
use crate::database::QueryFilter;
use crate::error::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let filter = QueryFilter::from_params(&TAG_FILTER, &params);
    let tags = state.tags.list_tags(viewer.visibility(), &filter).await?;
    Ok(Resource::new(&tags)?.into_json())
}

pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let detail = state.tags.get_tag(id, viewer.visibility()).await?;

    Ok(Resource::new(&detail)?
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    FormInput(input): FormInput,
) -> Result<StatusCode> {
    state.tags.rename_tag(id, &input).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn destroy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.tags.delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
