use axum_extra::extract::cookie::{Cookie, SameSite};
use cookie::time::Duration;
use serde::{Deserialize, Deserializer};

use crate::auth::SESSION_COOKIE;

pub fn session_cookie(token: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(max_age_seconds))
        .build()
}

/// Expired, empty session cookie for logging out.
pub fn logout_cookie() -> Cookie<'static> {
    session_cookie(String::new(), 0)
}

/// Ids come from the UI as either strings or numbers.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(f) => f.to_string(),
    })
}
