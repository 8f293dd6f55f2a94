//! Password hashing, JWT issue/verification and the bearer-token request guard.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{DatabaseService, DbError};
use crate::error::ApiError;
use crate::models::User;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the operator
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    match bcrypt::verify(password, hashed) {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Stored password hash could not be checked: {}", e);
            false
        }
    }
}

pub fn create_access_token(username: &str, secret: &str, expire_minutes: i64) -> Result<String, AuthError> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        exp: now + expire_minutes * 60,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Returns the user only if it exists and the password matches.
pub fn authenticate_user(db: &DatabaseService, username: &str, password: &str) -> Result<Option<User>, AuthError> {
    let user = match db.get_user(username)? {
        Some(user) => user,
        None => return Ok(None),
    };
    if !verify_password(password, &user.hashed_password) {
        return Ok(None);
    }
    Ok(Some(user))
}

/// Creates the configured default admin account when it does not exist yet.
pub fn initialize_admin_user(db: &DatabaseService, config: &Config) -> Result<bool, AuthError> {
    db.ensure_default_admin(
        &config.default_admin_username,
        &config.default_admin_password,
        |password| hash_password(password, config.password_hash_cost),
    )
}

/// An active operator identified by a valid bearer token.
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    fn resolve(req: &Request<'_>) -> Result<Self, ApiError> {
        let db = req
            .rocket()
            .state::<DatabaseService>()
            .ok_or_else(|| ApiError::Internal("Database not configured".to_string()))?;
        let config = req
            .rocket()
            .state::<Config>()
            .ok_or_else(|| ApiError::Internal("Configuration not loaded".to_string()))?;

        let token = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(ApiError::credentials)?;

        let claims = decode_access_token(token, &config.jwt_secret_key).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::credentials()
        })?;

        let user = db.get_user(&claims.sub)?.ok_or_else(ApiError::credentials)?;
        if !user.is_active {
            return Err(ApiError::BadRequest("Inactive user".to_string()));
        }
        Ok(AuthenticatedUser(user))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match Self::resolve(req) {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                let status: Status = err.status();
                // picked up by the catcher so the body carries the real reason
                req.local_cache(|| Some(err.clone()));
                Outcome::Error((status, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_db;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn password_round_trip() {
        let hashed = hash_password("hunter2", 4).unwrap();
        assert_ne!(hashed, "hunter2");
        assert!(verify_password("hunter2", &hashed));
        assert!(!verify_password("hunter3", &hashed));
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }

    #[test]
    fn tokens_carry_subject_and_expiry() {
        let token = create_access_token("admin", SECRET, 60).unwrap();
        let claims = decode_access_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = create_access_token("admin", "other-secret", 60).unwrap();
        assert!(matches!(decode_access_token(&token, SECRET), Err(AuthError::Token(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // well past the default validation leeway
        let token = create_access_token("admin", SECRET, -10).unwrap();
        assert!(decode_access_token(&token, SECRET).is_err());
    }

    #[test]
    fn authenticate_checks_user_and_password() {
        let (_dir, db) = temp_db();
        db.create_user("op", &hash_password("pw", 4).unwrap()).unwrap();

        assert!(authenticate_user(&db, "op", "pw").unwrap().is_some());
        assert!(authenticate_user(&db, "op", "wrong").unwrap().is_none());
        assert!(authenticate_user(&db, "ghost", "pw").unwrap().is_none());
    }
}
