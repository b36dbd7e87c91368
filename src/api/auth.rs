//! JWT auth for the board API.
//!
//! - Clients submit email + password to `/api/auth/login`
//! - The server returns a JWT valid for ~30 days carrying id, email,
//!   name, and role claims
//! - Unless `DEV_MODE` is set, protected endpoints require
//!   `Authorization: Bearer <jwt>`
//!
//! Passwords are stored as SHA-256 hex digests and compared in constant
//! time. Use a strong `JWT_SECRET` in production.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse, UserSummary};
use crate::config::Config;
use crate::error::ApiError;
use crate::model::{Role, User};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject: the user id.
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: Role,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Verified identity attached to each request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, ttl_days: i64, user: &AuthUser) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

fn auth_user_for_claims(claims: Claims) -> Option<AuthUser> {
    let id = Uuid::parse_str(&claims.sub).ok()?;
    Some(AuthUser {
        id,
        email: claims.email,
        name: claims.name,
        role: claims.role,
    })
}

/// Verify a token against the server config, returning the identity it
/// carries. Used by the WebSocket upgrade path, which cannot rely on the
/// Authorization-header middleware.
pub fn verify_token_for_config(token: &str, config: &Config) -> Option<AuthUser> {
    if !config.auth_required() {
        return Some(dev_user());
    }
    let secret = config.jwt_secret.as_deref()?;
    let claims = verify_jwt(token, secret).ok()?;
    auth_user_for_claims(claims)
}

/// Synthetic identity used when auth is disabled.
pub fn dev_user() -> AuthUser {
    AuthUser {
        id: Uuid::nil(),
        email: "dev@localhost".to_string(),
        name: "dev".to_string(),
        role: Role::Admin,
    }
}

pub async fn login(
    State(state): State<std::sync::Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::ValidationFailure(
            "email and password are required".to_string(),
        ));
    }

    // Single generic error for unknown email and bad password, with a
    // dummy comparison on the miss path to keep timing uniform.
    let submitted = User::password_digest(&req.password);
    let account = state.store.user_by_email(email).await;
    let valid = match &account {
        Some(user) => constant_time_eq(&submitted, &user.password_digest),
        None => {
            let _ = constant_time_eq(&submitted, &User::password_digest("dummy"));
            false
        }
    };
    let user = match account {
        Some(user) if valid => user,
        _ => return Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    };

    let auth_user = AuthUser {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
    };

    let secret = state
        .config
        .jwt_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("JWT_SECRET not configured".to_string()))?;

    let (token, exp) = issue_jwt(secret, state.config.jwt_ttl_days, &auth_user)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(LoginResponse {
        token,
        exp,
        user: UserSummary {
            id: user.id,
            name: user.name,
            role: user.role,
        },
    }))
}

pub async fn require_auth(
    State(state): State<std::sync::Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dev mode => no auth checks.
    if state.config.dev_mode {
        req.extensions_mut().insert(dev_user());
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match state.config.jwt_secret.as_deref() {
        Some(s) => s,
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT_SECRET not configured",
            )
                .into_response();
        }
    };

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("");

    if token.is_empty() {
        return ApiError::Unauthorized("Missing Authorization header".to_string()).into_response();
    }

    match verify_jwt(token, secret).ok().and_then(auth_user_for_claims) {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => ApiError::Unauthorized("Invalid or expired token".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn test_jwt_round_trip_preserves_identity() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: "admin@taskdeck.io".to_string(),
            name: "Admin".to_string(),
            role: Role::Admin,
        };
        let (token, exp) = issue_jwt("test-secret", 30, &user).unwrap();
        assert!(exp > Utc::now().timestamp());

        let claims = verify_jwt(&token, "test-secret").unwrap();
        let parsed = auth_user_for_claims(claims).unwrap();
        assert_eq!(parsed.id, user.id);
        assert_eq!(parsed.email, user.email);
        assert_eq!(parsed.role, Role::Admin);
    }

    #[test]
    fn test_jwt_rejects_wrong_secret() {
        let user = dev_user();
        let (token, _) = issue_jwt("secret-a", 30, &user).unwrap();
        assert!(verify_jwt(&token, "secret-b").is_err());
    }
}
