//! Local verification of provider-issued JWTs.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::types::{AuthUser, Claims};
use super::{AuthError, TokenVerifier};

const AUDIENCE: &str = "authenticated";

/// Verifies HS256 tokens signed with the project's JWT secret
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AuthError::InvalidToken
        })?;

        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            id,
            email: data.claims.email,
        })
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        self.validate(token)
    }
}

/// Sign a token the way the identity provider does, for tests and local
/// development.
pub fn create_token(
    secret: &str,
    user_id: Uuid,
    email: Option<&str>,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        aud: Some(AUDIENCE.to_string()),
        role: Some(AUDIENCE.to_string()),
        exp: (Utc::now() + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-only";

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(SECRET, user_id, Some("me@example.com"), Duration::hours(1))
            .expect("should create token");

        let user = JwtVerifier::new(SECRET)
            .validate(&token)
            .expect("should validate token");
        assert_eq!(user.id, user_id);
        assert_eq!(user.email.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = JwtVerifier::new(SECRET).validate("invalid-token");
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(SECRET, Uuid::new_v4(), None, Duration::hours(1)).unwrap();
        assert!(JwtVerifier::new("wrong-secret").validate(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token(SECRET, Uuid::new_v4(), None, Duration::hours(-2)).unwrap();
        assert!(JwtVerifier::new(SECRET).validate(&token).is_err());
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let claims = Claims {
            sub: "someone@example.com".to_string(),
            email: None,
            aud: Some(AUDIENCE.to_string()),
            role: None,
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(JwtVerifier::new(SECRET).validate(&token).is_err());
    }
}
