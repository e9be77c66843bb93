use super::created;
use super::extract::{AuthUser, FormInput, Viewer};
use super::resources::Resource;
use crate::app::AppState;
use crate::database::filter::NOTE_INDEX_FILTER;
use crate::database::{Pagination, QueryFilter};
use crate::error::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

/// Fields left out of the global note index
const INDEX_EXCLUDES: &[&str] = &["updated_at", "created_at", "content", "html_content"];

/// Paginated across all visible books. The page itself is a plain array;
/// paging metadata travels in `X-*` headers.
pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let filter = QueryFilter::from_params(&NOTE_INDEX_FILTER, &params);
    let pagination = Pagination::from_params(&params, state.config.per_page);
    let page = state
        .notes
        .list_notes(viewer.visibility(), &filter, pagination)
        .await?;

    let headers = [
        ("x-total-count", page.total.to_string()),
        ("x-current-page", page.pagination.page.to_string()),
        ("x-per-page", page.pagination.per_page.to_string()),
        (
            "x-last-page",
            page.pagination.last_page(page.total).to_string(),
        ),
    ];
    let body = Resource::new(&page.notes)?
        .except(INDEX_EXCLUDES)
        .for_viewer(viewer.is_authenticated())
        .into_json();

    Ok((headers, body))
}

pub async fn store(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(book_id): Path<i64>,
    FormInput(input): FormInput,
) -> Result<impl IntoResponse> {
    let note = state
        .notes
        .create_note(book_id, &input, auth.visibility())
        .await?;
    Ok(created(note.id))
}

pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let detail = state.notes.get_note(id, viewer.visibility()).await?;

    Ok(Resource::new(&detail)?
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    FormInput(input): FormInput,
) -> Result<Json<Value>> {
    let note = state.notes.update_note(id, &input).await?;
    Ok(Resource::new(&note)?.into_json())
}

pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.notes.delete_note(id, auth.visibility()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn force_destroy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.notes.force_delete_note(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
