//! JWT access token creation and verification.
//!
//! Access tokens are short-lived HS256 JWTs carrying the principal's identity
//! and role. Verification separates *expected* rejections (expired, malformed,
//! bad signature) from infrastructure failures: the former come back as
//! [`TokenRejection`] values so callers can turn them into precise 401s, the
//! latter surface as [`Error::Internal`].

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    auth::permissions::Role,
    config::Config,
    errors::Error,
    types::{SessionId, UserId},
};

/// Claims embedded in an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,    // Subject (user ID)
    pub email: String,  // User email
    pub role: Role,     // Account role at issue time
    pub sid: SessionId, // Refresh-token chain the token was issued against
    pub exp: i64,       // Expiration time
    pub iat: i64,       // Issued at
}

impl AccessClaims {
    /// Build fresh claims for a user with the configured expiry.
    pub fn new(user_id: UserId, email: &str, role: Role, session_id: SessionId, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.security.jwt_expiry;

        Self {
            sub: user_id,
            email: email.to_string(),
            role,
            sid: session_id,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Why a presented token was rejected. These are expected, client-caused
/// outcomes and map to 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    Expired,
    InvalidSignature,
    Malformed,
}

impl TokenRejection {
    pub fn message(&self) -> &'static str {
        match self {
            TokenRejection::Expired => "Token has expired",
            TokenRejection::InvalidSignature => "Token signature is invalid",
            TokenRejection::Malformed => "Token is malformed",
        }
    }
}

impl From<TokenRejection> for Error {
    fn from(rejection: TokenRejection) -> Self {
        Error::Unauthenticated {
            message: Some(rejection.message().to_string()),
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT tokens: secret_key is required".to_string(),
    })
}

/// Sign an access token for a user, bound to its refresh-token chain.
pub fn create_access_token(
    user_id: UserId,
    email: &str,
    role: Role,
    session_id: SessionId,
    config: &Config,
) -> Result<String, Error> {
    let claims = AccessClaims::new(user_id, email, role, session_id, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode an access token.
///
/// `Ok(Err(rejection))` is the expected-failure path; `Err(..)` means the
/// verification machinery itself failed (bad key material and the like).
pub fn verify_access_token(token: &str, config: &Config) -> Result<Result<AccessClaims, TokenRejection>, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    match decode::<AccessClaims>(token, &key, &validation) {
        Ok(data) => Ok(Ok(data.claims)),
        Err(e) => match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Ok(Err(TokenRejection::Expired)),

            jsonwebtoken::errors::ErrorKind::InvalidSignature => Ok(Err(TokenRejection::InvalidSignature)),

            // Structurally broken or otherwise unusable client tokens
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
            | jsonwebtoken::errors::ErrorKind::InvalidIssuer
            | jsonwebtoken::errors::ErrorKind::InvalidAudience
            | jsonwebtoken::errors::ErrorKind::InvalidSubject
            | jsonwebtoken::errors::ErrorKind::ImmatureSignature
            | jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_)
            | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Ok(Err(TokenRejection::Malformed)),

            // Server-side failures (key issues, internal crypto errors)
            jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
            | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
            | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
            | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
            | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
            | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
            | jsonwebtoken::errors::ErrorKind::Crypto(_) => Err(Error::Internal {
                operation: format!("JWT verification: {e}"),
            }),

            // Catch-all for any future error variants (default to server error for safety)
            _ => Err(Error::Internal {
                operation: format!("JWT verification (unknown error): {e}"),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, SecurityConfig};
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            auth: AuthConfig {
                security: SecurityConfig {
                    jwt_expiry: Duration::from_secs(3600), // 1 hour
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_verify_access_token() {
        let config = create_test_config();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let token = create_access_token(user_id, "test@example.com", Role::Employee, session_id, &config).unwrap();
        assert!(!token.is_empty());

        let claims = verify_access_token(&token, &config).unwrap().unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, Role::Employee);
        // The chain binding survives the round trip; the extractor relies on
        // it to reject tokens from a revoked session.
        assert_eq!(claims.sid, session_id);
    }

    #[test]
    fn test_tokens_from_different_logins_carry_distinct_chains() {
        let config = create_test_config();
        let user_id = Uuid::new_v4();

        let a = create_access_token(user_id, "test@example.com", Role::Employee, Uuid::new_v4(), &config).unwrap();
        let b = create_access_token(user_id, "test@example.com", Role::Employee, Uuid::new_v4(), &config).unwrap();

        let sid_a = verify_access_token(&a, &config).unwrap().unwrap().sid;
        let sid_b = verify_access_token(&b, &config).unwrap().unwrap().sid;
        assert_ne!(sid_a, sid_b);
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let token =
            create_access_token(Uuid::new_v4(), "test@example.com", Role::Admin, Uuid::new_v4(), &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let rejection = verify_access_token(&token, &config).unwrap().unwrap_err();
        assert_eq!(rejection, TokenRejection::InvalidSignature);
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let now = Utc::now();

        // Manually craft a token whose exp is in the past
        let claims = AccessClaims {
            sub: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::Employee,
            sid: Uuid::new_v4(),
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        };
        let key = EncodingKey::from_secret(config.secret_key.as_ref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let rejection = verify_access_token(&token, &config).unwrap().unwrap_err();
        assert_eq!(rejection, TokenRejection::Expired);
    }

    #[test]
    fn test_verify_malformed_tokens() {
        let config = create_test_config();

        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let rejection = verify_access_token(token, &config).unwrap().unwrap_err();
            assert_eq!(rejection, TokenRejection::Malformed, "token: {token}");
        }
    }

    #[test]
    fn test_rejection_maps_to_unauthenticated() {
        let err: Error = TokenRejection::Expired.into();
        assert!(matches!(err, Error::Unauthenticated { message: Some(m) } if m.contains("expired")));
    }
}
