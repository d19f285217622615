//! JWT authentication (Auth Gate)
//!
//! Resolves a caller identity from an `Authorization: Bearer <jwt>` header or
//! a `?token=` query parameter before the WebSocket upgrade completes.
//! Narrowed from the teacher's auth module: no roles/permissions, no login
//! endpoint, no password hashing — the bridge only verifies tokens minted
//! elsewhere by the same HS256 secret.

use anyhow::{bail, Context, Result};

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::AuthConfig;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the resolved user identity.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenType,
    /// Session ID for revocation.
    pub jti: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 60;
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 7;

/// Auth Gate state: the signing secret plus an in-memory revocation list.
/// Sessions are not persisted; a process restart clears all revocations.
pub struct AuthState {
    config: AuthConfig,
    revoked_tokens: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            revoked_tokens: RwLock::new(HashMap::new()),
        })
    }

    pub fn generate_access_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let expiry = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            token_type: TokenType::Access,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .context("failed to encode JWT")
    }

    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let expiry = now + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            token_type: TokenType::Refresh,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .context("failed to encode refresh token")
    }

    /// Validate a token's signature, expiry, and revocation status.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .context("invalid token")?;

        if self.is_revoked(&token_data.claims.jti) {
            bail!("token has been revoked");
        }

        Ok(token_data.claims)
    }

    pub fn revoke_token(&self, jti: &str) {
        let mut revoked = self.revoked_tokens.write().unwrap();
        revoked.insert(jti.to_string(), Utc::now());
    }

    fn is_revoked(&self, jti: &str) -> bool {
        self.revoked_tokens.read().unwrap().contains_key(jti)
    }

    /// Drop revocation entries older than the longest token lifetime;
    /// nothing references them for revocation checks past that point.
    pub fn cleanup(&self) {
        let now = Utc::now();
        let mut revoked = self.revoked_tokens.write().unwrap();
        revoked.retain(|_, revoked_at| now - *revoked_at <= Duration::days(REFRESH_TOKEN_EXPIRY_DAYS));
    }
}

/// Axum middleware guarding the WebSocket upgrade routes. Accepts either a
/// `Bearer` header or a `?token=` query parameter, since the browser
/// `WebSocket` API cannot set arbitrary headers.
pub async fn auth_middleware(
    State(state): State<Arc<AuthState>>,
    Query(params): Query<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let header_token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.to_string());

    let token = header_token
        .or_else(|| params.get("token").cloned())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state
        .validate_token(&token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    if claims.token_type != TokenType::Access {
        return Err(StatusCode::UNAUTHORIZED);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Extract the resolved claims attached by [`auth_middleware`].
pub fn extract_claims(request: &Request) -> Option<&Claims> {
    request.extensions().get::<Claims>()
}

/// Generate a fresh random JWT signing secret, used as the config default
/// when `JWT_SECRET` is unset.
pub fn generate_jwt_secret() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<AuthState> {
        AuthState::new(AuthConfig {
            jwt_secret: "test-secret".to_string(),
        })
    }

    #[test]
    fn generates_and_validates_access_token() {
        let state = state();
        let token = state.generate_access_token("user-123").unwrap();
        let claims = state.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn revoked_token_fails_validation() {
        let state = state();
        let token = state.generate_access_token("user-123").unwrap();
        let claims = state.validate_token(&token).unwrap();
        state.revoke_token(&claims.jti);
        assert!(state.validate_token(&token).is_err());
    }

    #[test]
    fn refresh_token_has_refresh_type() {
        let state = state();
        let token = state.generate_refresh_token("user-123").unwrap();
        let claims = state.validate_token(&token).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
    }
}
