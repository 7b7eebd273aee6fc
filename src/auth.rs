// Authentication - credential hashing + JWT issue/validate

use sha2::{Digest, Sha256};

/// Hash a password for storage. Hex-encoded SHA-256.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    hash_password(password) == stored_hash
}

#[cfg(feature = "server")]
pub use self::jwt::{issue_token, validate_token, Claims, TOKEN_TTL_HOURS};

#[cfg(feature = "server")]
mod jwt {
    use crate::config::JwtConfig;
    use anyhow::{Context, Result};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
    use serde::{Deserialize, Serialize};

    /// Bearer token lifetime.
    pub const TOKEN_TTL_HOURS: i64 = 8;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Claims {
        pub sub: String,
        pub iss: String,
        pub aud: String,
        pub iat: i64,
        pub exp: i64,
    }

    /// Issue a signed bearer token for an authenticated user.
    pub fn issue_token(jwt: &JwtConfig, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iss: jwt.issuer.clone(),
            aud: jwt.audience.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt.secret_key.as_bytes()),
        )
        .context("Failed to sign token")
    }

    /// Validate a bearer token: signature, lifetime, issuer and audience.
    pub fn validate_token(jwt: &JwtConfig, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&jwt.issuer]);
        validation.set_audience(&[&jwt.audience]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt.secret_key.as_bytes()),
            &validation,
        )
        .context("Invalid token")?;

        Ok(data.claims)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn test_jwt() -> JwtConfig {
            JwtConfig {
                secret_key: "test-secret-key-please-rotate".to_string(),
                issuer: "game-catalog".to_string(),
                audience: "game-catalog-client".to_string(),
            }
        }

        #[test]
        fn test_issue_and_validate_roundtrip() {
            let jwt = test_jwt();
            let token = issue_token(&jwt, "collector").unwrap();
            let claims = validate_token(&jwt, &token).unwrap();

            assert_eq!(claims.sub, "collector");
            assert_eq!(claims.iss, "game-catalog");
            assert_eq!(claims.aud, "game-catalog-client");
            assert!(claims.exp > claims.iat);
        }

        #[test]
        fn test_wrong_secret_rejected() {
            let jwt = test_jwt();
            let token = issue_token(&jwt, "collector").unwrap();

            let mut other = test_jwt();
            other.secret_key = "a-different-secret".to_string();
            assert!(validate_token(&other, &token).is_err());
        }

        #[test]
        fn test_wrong_issuer_or_audience_rejected() {
            let jwt = test_jwt();
            let token = issue_token(&jwt, "collector").unwrap();

            let mut bad_issuer = test_jwt();
            bad_issuer.issuer = "someone-else".to_string();
            assert!(validate_token(&bad_issuer, &token).is_err());

            let mut bad_audience = test_jwt();
            bad_audience.audience = "someone-else".to_string();
            assert!(validate_token(&bad_audience, &token).is_err());
        }

        #[test]
        fn test_garbage_token_rejected() {
            assert!(validate_token(&test_jwt(), "not.a.token").is_err());
        }
    }
}
