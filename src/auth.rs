//! Password hashing, access tokens and the authenticated-user extractor

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::models::User;
use crate::repo;
use crate::AppState;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("failed to hash password: {e}"))
}

/// Checks a password against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, hashed: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hashed) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// JWT claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

/// Signing material and lifetime for access tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Signs a new token for a user
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| anyhow!("token expiry out of range"))?;

        let claims = Claims {
            sub: user.get_id(),
            email: user.get_email(),
            role: user.get_role().to_string(),
            iat: now.timestamp() as usize,
            exp: expiration.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verifies a token's signature and expiry
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Authenticated user extracted from the `Authorization: Bearer <token>` header
///
/// The account is reloaded on every request so deactivation takes effect
/// before the token expires.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> String {
        self.0.get_id()
    }

    pub fn user(&self) -> &User {
        &self.0
    }

    /// Returns `Err(Forbidden)` unless the user is an administrator
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            warn!(user_id = %self.0.get_id(), "non-admin user attempted an admin action");
            Err(ApiError::Forbidden)
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

        let claims = state.tokens.verify(token).map_err(|e| {
            debug!("rejected token: {}", e);
            ApiError::Unauthorized("Could not validate credentials".to_string())
        })?;

        let user = repo::get_user(&state.pool, &claims.sub)?
            .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

        if !user.is_active() {
            return Err(ApiError::Unauthorized("Inactive user".to_string()));
        }

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("secreto123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secreto123", &hash));
        assert!(!verify_password("otro", &hash));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_token_carries_identity() {
        let keys = TokenKeys::new("test-secret", 30);
        let user = User::new("ana@example.com".to_string(), "h".to_string(), None, UserRole::Admin);

        let token = keys.sign(&user).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, user.get_id());
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.role, "ADMIN");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let user = User::new("ana@example.com".to_string(), "h".to_string(), None, UserRole::User);
        let token = TokenKeys::new("one", 30).sign(&user).unwrap();

        assert!(TokenKeys::new("two", 30).verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = TokenKeys::new("test-secret", -10);
        let user = User::new("ana@example.com".to_string(), "h".to_string(), None, UserRole::User);
        let token = keys.sign(&user).unwrap();

        assert!(keys.verify(&token).is_err());
    }
}
