//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the external auth service and carry
//! `{sub, email, role, exp}`.

use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;
use common::{Requester, Role, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Signing and verification keys for bearer tokens.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Verifies a token and returns the requester it identifies.
    pub fn verify(&self, token: &str) -> Result<Requester, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let user_id = UserId::parse(&data.claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid user id in token".to_string()))?;

        Ok(Requester::new(
            user_id,
            data.claims.email,
            Role::from_claim(&data.claims.role),
        )
        .with_token(token))
    }

    /// Signs a token for `requester` valid for `ttl`. Used by local tooling;
    /// production tokens come from the auth service.
    pub fn issue(&self, requester: &Requester, ttl: Duration) -> Result<String, ApiError> {
        let ttl = chrono::TimeDelta::from_std(ttl)
            .map_err(|e| ApiError::Internal(format!("invalid token lifetime: {e}")))?;
        let claims = Claims {
            sub: requester.user_id.to_string(),
            email: requester.email.clone(),
            role: requester.role.as_str().to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Auth(pub Requester);

impl<S> FromRequestParts<S> for Auth
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Access token required".to_string()))?;

        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".to_string()))?;

        AuthKeys::from_ref(state)
            .verify(token)
            .map(Auth)
            .inspect_err(|_| metrics::counter!("auth_rejections_total").increment(1))
    }
}

pub fn ensure_admin(requester: &Requester) -> Result<(), ApiError> {
    if !requester.is_admin() {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}
