//! Request extractors
//!
//! `Viewer` resolves the optional bearer token and the `edit_mode` flag into
//! a `Visibility`. `AuthUser` is the authentication gate for mutating
//! routes; it is always the first extractor so a guest gets 401 before any
//! lookup happens. `FormInput` reads a JSON, urlencoded or multipart body
//! into a `RawInput`.

use crate::app::AppState;
use crate::database::{User, Visibility};
use crate::error::AppError;
use crate::validation::{parse_bool, RawInput, UploadedFile};
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Multipart, Query, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::Form;
use std::collections::HashMap;

pub const EDIT_MODE_PARAM: &str = "edit_mode";

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn edit_mode_requested(parts: &Parts) -> bool {
    Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(params)| params.get(EDIT_MODE_PARAM).and_then(|v| parse_bool(v)))
        .unwrap_or(false)
}

/// Caller of a read route; may be a guest.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: Option<User>,
    pub edit_mode: bool,
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::for_request(self.is_authenticated(), self.edit_mode)
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let user = match bearer_token(parts) {
            Some(token) => state.auth.authenticate(&token).await?,
            None => None,
        };

        Ok(Viewer {
            user,
            edit_mode: edit_mode_requested(parts),
        })
    }
}

/// Authenticated caller; rejects guests with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
    pub edit_mode: bool,
}

impl AuthUser {
    pub fn visibility(&self) -> Visibility {
        Visibility::for_request(true, self.edit_mode)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let user = state
            .auth
            .authenticate(&token)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser {
            user,
            token,
            edit_mode: edit_mode_requested(parts),
        })
    }
}

/// Request body as raw fields. An empty body yields no fields.
#[derive(Debug, Clone, Default)]
pub struct FormInput(pub RawInput);

impl<S> FromRequest<S> for FormInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return read_multipart(multipart).await.map(FormInput);
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            let mut input = RawInput::default();
            for (name, value) in pairs {
                input.insert_text(&name, value);
            }
            return Ok(FormInput(input));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(FormInput::default());
        }

        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("Malformed JSON body: {}", e)))?;
        RawInput::from_json(value).map(FormInput)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<RawInput, AppError> {
    let mut input = RawInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if field.file_name().is_some() {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;

            input.insert_file(
                &name,
                UploadedFile {
                    filename,
                    content_type,
                    data: data.to_vec(),
                },
            );
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Read error: {}", e)))?;
            input.insert_text(&name, text);
        }
    }

    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use crate::validation::InputValue;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(
            bearer_token(&parts("/", Some("Bearer abc"))).as_deref(),
            Some("abc")
        );
        assert_eq!(
            bearer_token(&parts("/", Some("bearer abc"))).as_deref(),
            Some("abc")
        );
        assert!(bearer_token(&parts("/", Some("Basic abc"))).is_none());
        assert!(bearer_token(&parts("/", None)).is_none());
    }

    #[test]
    fn test_edit_mode_flag() {
        assert!(edit_mode_requested(&parts("/books?edit_mode=1", None)));
        assert!(edit_mode_requested(&parts("/books?edit_mode=true", None)));
        assert!(!edit_mode_requested(&parts("/books?edit_mode=0", None)));
        assert!(!edit_mode_requested(&parts("/books", None)));
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_input() {
        let req = HttpRequest::builder()
            .method("PUT")
            .uri("/books/1")
            .body(Body::empty())
            .unwrap();
        let FormInput(input) = FormInput::from_request(req, &()).await.unwrap();
        assert!(!input.contains("title"));
    }

    #[tokio::test]
    async fn test_urlencoded_body() {
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/books")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("title=Dune&total=100&tags[]=a&tags[]=b"))
            .unwrap();
        let FormInput(input) = FormInput::from_request(req, &()).await.unwrap();
        assert!(input.contains("title"));
        match input.get("tags") {
            Some(InputValue::Value(serde_json::Value::Array(items))) => assert_eq!(items.len(), 2),
            other => panic!("unexpected tags: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/books")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        assert!(matches!(
            FormInput::from_request(req, &()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
