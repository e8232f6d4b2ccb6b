use rand::Rng;
use sheets::config::{read_secret, try_load};
use tracing::{info, warn};

use crate::auth::Users;

pub struct Config {
    pub port: u16,
    pub session_secret: Vec<u8>,
    pub session_ttl_hours: i64,
    pub users: Users,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "5000"),
            session_secret: session_secret(),
            session_ttl_hours: try_load("SESSION_TTL_HOURS", "12"),
            users: load_users(),
        }
    }
}

fn session_secret() -> Vec<u8> {
    match read_secret("SESSION_SECRET") {
        Some(secret) => secret.into_bytes(),
        None => {
            warn!("SESSION_SECRET not set, sessions will not survive a restart");
            let mut key = vec![0u8; 32];
            rand::rng().fill(key.as_mut_slice());
            key
        }
    }
}

fn load_users() -> Users {
    let Some(raw) = read_secret("TEAM_USERS") else {
        warn!("TEAM_USERS not set, nobody can log in");
        return Users::default();
    };

    let users = Users::from_json(&raw)
        .map_err(|e| {
            warn!("Invalid TEAM_USERS value: {e}");
        })
        .expect("Secrets misconfigured!");

    info!("Loaded {} users", users.len());
    users
}
