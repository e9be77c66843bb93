//! HTTP API
//!
//! JSON routes over the services. Read routes accept guests; every
//! mutating route goes through the `AuthUser` gate first.

pub mod auth;
pub mod books;
pub mod extract;
pub mod notes;
pub mod posts;
pub mod resources;
pub mod tags;

use crate::app::AppState;
use crate::config::{MAX_UPLOAD_BYTES, UPLOADS_URL_PREFIX};
use crate::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// 201 with the new row's ID
pub(crate) fn created(id: i64) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads.root().to_path_buf());

    Router::new()
        .route("/books", get(books::index).post(books::store))
        .route(
            "/books/{id}",
            get(books::show)
                .put(books::update)
                .patch(books::update)
                .delete(books::destroy),
        )
        .route("/books/{id}/notes", post(notes::store))
        .route("/deleted-books/{id}", delete(books::force_destroy))
        .route("/notes", get(notes::index))
        .route(
            "/notes/{id}",
            get(notes::show)
                .put(notes::update)
                .patch(notes::update)
                .delete(notes::destroy),
        )
        .route("/deleted-notes/{id}", delete(notes::force_destroy))
        .route("/posts", get(posts::index).post(posts::store))
        .route(
            "/posts/{id}",
            get(posts::show)
                .put(posts::update)
                .patch(posts::update)
                .delete(posts::destroy),
        )
        .route("/deleted-posts/{id}", delete(posts::force_destroy))
        .route("/tags", get(tags::index))
        .route(
            "/tags/{id}",
            get(tags::show)
                .put(tags::update)
                .patch(tags::update)
                .delete(tags::destroy),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/info", get(auth::info))
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process exits
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
