//! Account authentication.
//!
//! # Responsibilities
//! - Hash and verify passwords (argon2id, PHC strings)
//! - Issue, resolve and revoke bearer session tokens
//! - Register and log in users against storage

pub mod password;
pub mod session;

use thiserror::Error;

use crate::storage::{NewUser, Storage, StorageError, User};

pub use password::{hash_password, verify_password};
pub use session::{bearer_token, SessionStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Invalid(String),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Registration payload after JSON decoding.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Validate and create an account with a hashed password.
pub async fn register(storage: &dyn Storage, credentials: Credentials) -> Result<User, AuthError> {
    let username = credentials.username.trim();
    if username.is_empty() {
        return Err(AuthError::Invalid("Username is required".to_string()));
    }
    if credentials.password.len() < 6 {
        return Err(AuthError::Invalid(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    let email = credentials.email.unwrap_or_default();
    if !email.is_empty() && !email.contains('@') {
        return Err(AuthError::Invalid("Invalid email address".to_string()));
    }

    let user = storage
        .create_user(NewUser {
            username: username.to_string(),
            password_hash: hash_password(&credentials.password)?,
            email,
        })
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(user)
}

/// Check credentials and return the matching user.
pub async fn login(storage: &dyn Storage, username: &str, password: &str) -> Result<User, AuthError> {
    let user = storage
        .get_user_by_username(username.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(password, &user.password) {
        tracing::debug!(username = %username, "Login rejected");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
            email: Some(format!("{username}@example.com")),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let storage = MemStorage::new();
        let user = register(&storage, creds("carol", "secret-pw")).await.unwrap();
        assert_ne!(user.password, "secret-pw");

        let logged_in = login(&storage, "carol", "secret-pw").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(matches!(
            login(&storage, "carol", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            login(&storage, "nobody", "secret-pw").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let storage = MemStorage::new();
        assert!(matches!(register(&storage, creds("", "secret-pw")).await, Err(AuthError::Invalid(_))));
        assert!(matches!(register(&storage, creds("dave", "123")).await, Err(AuthError::Invalid(_))));

        register(&storage, creds("dave", "secret-pw")).await.unwrap();
        let err = register(&storage, creds("dave", "secret-pw")).await.unwrap_err();
        assert_eq!(err.to_string(), "Username already exists");
    }
}
