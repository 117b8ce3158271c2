use crate::config::Config;
use crate::error::AppError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token, the user's id.
    pub sub: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Unique token id, used to revoke refreshed tokens.
    pub jti: Uuid,
}

/// A signed access token ready to hand to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Signs and checks HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64, refresh_ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
            refresh_ttl: Duration::minutes(refresh_ttl_minutes),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_ttl_minutes,
            config.jwt_refresh_ttl_minutes,
        )
    }

    /// Issues a token for `user_id`, valid from now.
    pub fn issue(&self, user_id: i64) -> Result<IssuedToken, AppError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issues a token for `user_id` as if signed at `now`.
    pub fn issue_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<IssuedToken, AppError> {
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4(),
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.ttl.num_seconds(),
        })
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Checks the signature of a possibly expired token and that its refresh
    /// window (`iat + refresh_ttl`) is still open.
    pub fn verify_for_refresh(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;

        if self.refresh_deadline(&claims) <= Utc::now() {
            return Err(AppError::Unauthorized(
                "Token can no longer be refreshed".into(),
            ));
        }
        Ok(claims)
    }

    /// Moment after which `claims` can no longer be refreshed.
    pub fn refresh_deadline(&self, claims: &Claims) -> DateTime<Utc> {
        let issued = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .unwrap_or_else(Utc::now);
        issued + self.refresh_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test_secret_for_gen_verify", 60, 120)
    }

    #[test]
    fn test_token_generation_and_verification() {
        let tokens = service();
        let issued = tokens.issue(1).unwrap();
        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_in, 3600);

        let claims = tokens.verify(&issued.access_token).unwrap();
        assert_eq!(claims.sub, 1);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_expiration() {
        let tokens = service();
        let issued = tokens
            .issue_at(2, Utc::now() - Duration::minutes(90))
            .unwrap();

        match tokens.verify(&issued.access_token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("ExpiredSignature")),
            other => panic!("expected expired token, got {:?}", other),
        }

        // Still inside the two hour refresh window.
        let claims = tokens.verify_for_refresh(&issued.access_token).unwrap();
        assert_eq!(claims.sub, 2);
    }

    #[test]
    fn test_refresh_window_closes() {
        let tokens = service();
        let issued = tokens
            .issue_at(3, Utc::now() - Duration::minutes(121))
            .unwrap();
        assert!(matches!(
            tokens.verify_for_refresh(&issued.access_token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_invalid_token_signature() {
        let issued = TokenService::new("a_completely_different_secret", 60, 120)
            .issue(4)
            .unwrap();

        match service().verify(&issued.access_token) {
            Err(AppError::Unauthorized(msg)) => assert!(msg.contains("InvalidSignature")),
            other => panic!("expected invalid signature, got {:?}", other),
        }
        assert!(service().verify_for_refresh("not-a-jwt").is_err());
    }
}
