use super::model::AuthenticatedUser;
use crate::core::config::AuthConfig;
use crate::core::error::AppError;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Verifies HS256 bearer tokens issued by the portal's identity service
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(rename = "exp")]
    _exp: u64,
    #[serde(default)]
    roles: Vec<String>,
}

impl JwtValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = config.jwt_leeway.as_secs();

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        let claims = token_data.claims;
        Ok(AuthenticatedUser {
            sub: claims.sub,
            roles: claims.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use std::time::Duration;

    const SECRET: &str = "test-secret";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        iss: Option<&'a str>,
        roles: Vec<&'a str>,
    }

    fn config(issuer: Option<&str>) -> AuthConfig {
        AuthConfig {
            jwt_secret: SECRET.to_string(),
            issuer: issuer.map(str::to_string),
            jwt_leeway: Duration::from_secs(0),
        }
    }

    fn token(secret: &str, exp_offset: i64, iss: Option<&str>) -> String {
        let claims = TestClaims {
            sub: "user-42",
            exp: Utc::now().timestamp() + exp_offset,
            iss,
            roles: vec!["content_admin"],
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_user() {
        let validator = JwtValidator::new(&config(None));

        let user = validator.validate_token(&token(SECRET, 600, None)).unwrap();

        assert_eq!(user.sub, "user-42");
        assert!(user.has_admin_access());
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let validator = JwtValidator::new(&config(None));
        let result = validator.validate_token(&token("other-secret", 600, None));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let validator = JwtValidator::new(&config(None));
        let result = validator.validate_token(&token(SECRET, -600, None));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_issuer_checked_when_configured() {
        let validator = JwtValidator::new(&config(Some("https://id.kampus.test")));

        assert!(validator
            .validate_token(&token(SECRET, 600, Some("https://id.kampus.test")))
            .is_ok());
        assert!(validator
            .validate_token(&token(SECRET, 600, Some("https://elsewhere.test")))
            .is_err());
    }
}
