use super::extract::{AuthUser, FormInput, Viewer};
use super::resources::Resource;
use super::created;
use crate::app::AppState;
use crate::database::filter::{BOOK_FILTER, NOTE_FILTER};
use crate::database::QueryFilter;
use crate::error::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;
use std::collections::HashMap;

/// Fields of embedded notes left out of the book detail
const DETAIL_NOTE_EXCLUDES: &[&str] = &["updated_at", "content", "html_content"];

pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let filter = QueryFilter::from_params(&BOOK_FILTER, &params);
    let books = state.books.list_books(viewer.visibility(), &filter).await?;

    Ok(Resource::new(&books)?
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn store(
    State(state): State<AppState>,
    _auth: AuthUser,
    FormInput(input): FormInput,
) -> Result<impl IntoResponse> {
    let book = state.books.create_book(&input).await?;
    Ok(created(book.id))
}

pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let filter = QueryFilter::from_params(&NOTE_FILTER, &params);
    let detail = state
        .books
        .get_book(id, viewer.visibility(), &filter)
        .await?;

    Ok(Resource::new(&detail)?
        .except_nested("notes", DETAIL_NOTE_EXCLUDES)
        .for_viewer(viewer.is_authenticated())
        .into_json())
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    FormInput(input): FormInput,
) -> Result<Json<Value>> {
    let book = state.books.update_book(id, &input).await?;
    Ok(Resource::new(&book)?.into_json())
}

pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.books.delete_book(id, auth.visibility()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn force_destroy(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.books.force_delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
