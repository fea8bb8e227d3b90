//! HS256 access-token validation.
//!
//! Users sign in with the external auth provider, which issues HS256 JWTs
//! whose `sub` is the user's UUID. This service only verifies them.
//! [`generate_access_token`] mints compatible tokens for local tooling and
//! tests.

use dailywatch_core::types::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims read from every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's id at the auth provider.
    pub sub: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    #[serde(default)]
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC-SHA256 secret of the auth provider.
    pub secret: String,
}

impl JwtConfig {
    /// Load from `AUTH_JWT_SECRET`.
    ///
    /// # Panics
    ///
    /// Panics if `AUTH_JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .expect("AUTH_JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "AUTH_JWT_SECRET must not be empty");
        Self { secret }
    }
}

/// Mint an HS256 token for `user_id` valid for `ttl_mins` minutes.
pub fn generate_access_token(
    user_id: UserId,
    email: Option<&str>,
    ttl_mins: i64,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        email: email.map(str::to_string),
        exp: now + ttl_mins * 60,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate signature and expiry and return the embedded [`Claims`].
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    // Provider tokens carry an audience we do not pin.
    validation.validate_aud = false;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}
