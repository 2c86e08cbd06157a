use crate::types::{Claims, CoreError, Result, TokenResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Mints and verifies the JWT-bearer tokens that carry `(user_id, email)` into the core.
///
/// Registration, password policy, and session storage are out of scope (SPEC_FULL.md §1) —
/// this service only signs and checks claims; it never sees a password.
pub struct AuthService {
    jwt_secret: String,
    access_expiry: i64,
    refresh_expiry: i64,
}

impl AuthService {
    /// Creates a new AuthService with the given configuration.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for signing JWTs (should be at least 32 chars)
    /// * `access_expiry` - Access token validity in seconds
    /// * `refresh_expiry` - Refresh token validity in seconds
    pub fn new(jwt_secret: String, access_expiry: i64, refresh_expiry: i64) -> Self {
        Self {
            jwt_secret,
            access_expiry,
            refresh_expiry,
        }
    }

    /// Mints an access/refresh token pair for a user.
    pub fn generate_tokens(&self, user_id: &str, email: &str) -> Result<TokenResponse> {
        let access_token = self.generate_token(user_id, email, self.access_expiry)?;
        let refresh_token = self.generate_token(user_id, email, self.refresh_expiry)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            expires_in: self.access_expiry,
        })
    }

    fn generate_token(&self, user_id: &str, email: &str, expiry: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (Utc::now() + Duration::seconds(expiry)).timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| CoreError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| CoreError::Forbidden(format!("invalid token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> AuthService {
        AuthService::new(
            "test-secret-key-that-is-at-least-32-chars".to_string(),
            900,    // 15 minutes
            604800, // 7 days
        )
    }

    #[test]
    fn test_token_generation() {
        let service = create_test_service();
        let tokens = service
            .generate_tokens("user-123", "test@example.com")
            .expect("should generate tokens");

        assert!(!tokens.access_token.is_empty());
        assert!(!tokens.refresh_token.is_empty());
        assert_eq!(tokens.expires_in, 900);
        assert_ne!(tokens.access_token, tokens.refresh_token);
    }

    #[test]
    fn test_token_verification_success() {
        let service = create_test_service();
        let tokens = service
            .generate_tokens("user-456", "user@test.com")
            .expect("should generate tokens");
        let claims = service
            .verify_token(&tokens.access_token)
            .expect("should verify token");

        assert_eq!(claims.sub, "user-456");
        assert_eq!(claims.email, "user@test.com");
    }

    #[test]
    fn test_token_verification_invalid_token() {
        let service = create_test_service();
        assert!(service.verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_token_verification_wrong_secret() {
        let service1 =
            AuthService::new("secret-one-that-is-32-chars-long".to_string(), 900, 604800);
        let service2 =
            AuthService::new("secret-two-that-is-32-chars-long".to_string(), 900, 604800);

        let tokens = service1
            .generate_tokens("user-789", "test@example.com")
            .expect("should generate");
        assert!(service2.verify_token(&tokens.access_token).is_err());
    }

    #[test]
    fn test_claims_expiration() {
        let service = create_test_service();
        let tokens = service
            .generate_tokens("user", "user@example.com")
            .expect("should generate");
        let claims = service
            .verify_token(&tokens.access_token)
            .expect("should verify");

        let now = chrono::Utc::now().timestamp() as usize;
        assert!(claims.iat <= now && claims.iat >= now - 5);

        let expected_exp = claims.iat + 900;
        assert!(claims.exp >= expected_exp - 5 && claims.exp <= expected_exp + 5);
    }
}
