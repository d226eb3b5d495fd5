//! Bearer-token authentication for the query boundary.
//!
//! `POST /api/auth/login` trades configured credentials for an HS256 JWT
//! carrying the caller's role. Handlers take an [`AuthUser`] extractor and
//! call [`AuthUser::require`] when a route is admin-only.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Claims carried by issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

/// One login that may obtain a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Issues and verifies tokens.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: u32,
    accounts: Vec<Account>,
}

/// Extracted from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

// ---

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Parse `name:password:role` entries separated by commas.
pub fn parse_accounts(raw: &str) -> Result<Vec<Account>, String> {
    // ---
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            // Passwords may contain ':'; the role is always the last segment
            let parsed = entry.rsplit_once(':').and_then(|(rest, role)| {
                let (username, password) = rest.split_once(':')?;
                Some((username, password, Role::parse(role)?))
            });
            match parsed {
                Some((username, password, role))
                    if !username.is_empty() && !password.is_empty() =>
                {
                    Ok(Account {
                        username: username.to_string(),
                        password: password.to_string(),
                        role,
                    })
                }
                _ => Err(format!("invalid account entry '{entry}'")),
            }
        })
        .collect()
}

impl Authenticator {
    // ---
    pub fn new(secret: &str, ttl_hours: u32, accounts: Vec<Account>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
            accounts,
        }
    }

    /// Token for matching credentials, `Unauthorized` otherwise.
    pub fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        // ---
        let account = self
            .accounts
            .iter()
            .find(|a| a.username == username && a.password == password)
            .ok_or(ApiError::Unauthorized)?;

        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: account.username.clone(),
            role: account.role,
            iat: now,
            exp: now + u64::from(self.ttl_hours) * 3600,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to generate token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        // ---
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::Unauthorized
            })
    }
}

impl AuthUser {
    /// Admins pass every check; users pass only `Role::User`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        match (self.0.role, role) {
            (Role::Admin, _) | (Role::User, Role::User) => Ok(()),
            _ => Err(ApiError::Forbidden(role.as_str())),
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<Authenticator>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let auth = Arc::<Authenticator>::from_ref(state);
        auth.verify(token).map(AuthUser)
    }
}
