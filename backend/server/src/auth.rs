//! # Sessions
//!
//! Static user table plus a signed session cookie.
//!
//! ## Cookie
//! - `session=<jwt>`, HttpOnly, SameSite=Lax
//! - HS256 token over `{sub, role, exp}`, signed with the server secret
//! - expiry is checked by the token validation, with no leeway
//! - no server-side session state, logging out just clears the cookie
//!
//! ## Roles
//! - admin: may write payments and attendance
//! - viewer: read-only, also the default for users without a role
use std::{collections::HashMap, sync::Arc};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ActionError, AppError},
    state::AppState,
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Viewer,
}

#[derive(Deserialize)]
struct UserEntry {
    username: String,
    password: String,
    #[serde(default)]
    role: Role,
}

#[derive(Default)]
pub struct Users {
    entries: HashMap<String, (String, Role)>,
}

impl Users {
    /// Parses `[{"username": "...", "password": "...", "role": "admin"}]`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<UserEntry> = serde_json::from_str(raw)?;

        Ok(Self {
            entries: entries
                .into_iter()
                .map(|e| (e.username, (e.password, e.role)))
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verify(&self, username: &str, password: &str) -> Option<Role> {
        self.entries
            .get(username)
            .filter(|(expected, _)| expected == password)
            .map(|(_, role)| *role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    pub role: Role,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
}

pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user.to_string(),
            role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Option<Session> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| debug!("Rejected session token: {e}"))
            .ok()?
            .claims;

        Some(Session {
            user: claims.sub,
            role: claims.role,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.value())
            .filter(|token| !token.is_empty())
            .and_then(|token| state.sessions.verify(token))
            .ok_or(AppError::LoginRequired)
    }
}

/// A session allowed to write.
pub struct Admin(pub Session);

impl FromRequestParts<Arc<AppState>> for Admin {
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        if !session.is_admin() {
            return Err(AppError::Forbidden.into());
        }

        Ok(Admin(session))
    }
}
