//! Authentication service
//!
//! Passwords are stored as Argon2id PHC strings. Bearer tokens are random
//! 32-byte values handed to the client once; only their SHA-256 is stored.

use crate::database::{Repository, User};
use crate::error::{AppError, Result};
use crate::storage::blob_store::calculate_hash;
use crate::validation::{Locale, Login, RawInput, ValidationErrors};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;

const TOKEN_BYTES: usize = 32;
const SALT_BYTES: usize = 16;

/// Token returned by a successful login
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Repository,
    token_ttl: Duration,
    locale: Locale,
}

impl AuthService {
    pub fn new(repo: Repository, token_ttl_hours: i64, locale: Locale) -> Self {
        Self {
            repo,
            token_ttl: Duration::hours(token_ttl_hours),
            locale,
        }
    }

    /// Provision a user account
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::BadRequest(
                "username and password must not be empty".to_string(),
            ));
        }
        if self.repo.find_user_by_username(username).await?.is_some() {
            return Err(AppError::BadRequest(format!(
                "user {} already exists",
                username
            )));
        }

        let password_hash = hash_password(password)?;
        self.repo.create_user(username, &password_hash).await
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, input: &RawInput) -> Result<IssuedToken> {
        let Login { username, password } = Login::parse(input, self.locale)?;

        let user = match self.repo.find_user_by_username(&username).await? {
            Some(user) if verify_password(&password, &user.password_hash) => user,
            _ => {
                tracing::info!("Rejected login for {}", username);
                return Err(
                    ValidationErrors::single("username", self.locale.bad_credentials()).into(),
                );
            }
        };

        let token = generate_token();
        let now = Utc::now();
        self.repo
            .store_token(&calculate_hash(token.as_bytes()), user.id, now + self.token_ttl)
            .await?;
        self.repo.purge_expired_tokens(now).await?;

        tracing::info!("User logged in: {}", user.username);

        Ok(IssuedToken {
            access_token: token,
            token_type: "bearer",
            expires_in: self.token_ttl.num_seconds(),
        })
    }

    /// Owner of a live bearer token
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        self.repo
            .find_user_by_token(&calculate_hash(token.as_bytes()), Utc::now())
            .await
    }

    pub async fn logout(&self, token: &str) -> Result<()> {
        self.repo
            .revoke_token(&calculate_hash(token.as_bytes()))
            .await?;
        tracing::debug!("Token revoked");
        Ok(())
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);

    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| AppError::Generic(format!("Salt encoding failed: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| AppError::Generic(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use serde_json::json;

    async fn create_test_service() -> AuthService {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        AuthService::new(repo, 24, Locale::En)
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not a phc string"));
    }

    #[test]
    fn test_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_login_authenticate_logout() {
        let service = create_test_service().await;
        service.create_user("reader", "secret").await.unwrap();

        let bad = RawInput::from_json(json!({ "username": "reader", "password": "nope" })).unwrap();
        match service.login(&bad).await {
            Err(AppError::Validation(errors)) => assert!(errors.contains("username")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let good =
            RawInput::from_json(json!({ "username": "reader", "password": "secret" })).unwrap();
        let issued = service.login(&good).await.unwrap();
        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_in, 24 * 3600);

        let user = service.authenticate(&issued.access_token).await.unwrap();
        assert_eq!(user.unwrap().username, "reader");

        service.logout(&issued.access_token).await.unwrap();
        assert!(service
            .authenticate(&issued.access_token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let service = create_test_service().await;
        service.create_user("reader", "secret").await.unwrap();
        assert!(matches!(
            service.create_user("reader", "other").await,
            Err(AppError::BadRequest(_))
        ));
    }
}
