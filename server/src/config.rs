use anyhow::{Context, Result, anyhow};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_db::DatabaseSettings;
use tracing::warn;

/// Minimum decoded length accepted for `COOKIE_SECRET_BASE64`.
const COOKIE_KEY_LEN: usize = 64;

/// Settings resolved once at startup and shared read-only with every handler.
#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cookie_key: Key,
    pub cookie_secure: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let database = DatabaseSettings::from_env();

        let cookie_key = match std::env::var("COOKIE_SECRET_BASE64") {
            Ok(secret) if !secret.trim().is_empty() => decode_cookie_key(&secret)?,
            _ => {
                warn!("COOKIE_SECRET_BASE64 not set; flash messages will not survive a restart");
                Key::generate()
            }
        };

        let cookie_secure = std::env::var("COOKIE_SECURE")
            .ok()
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database,
            cookie_key,
            cookie_secure,
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database", &self.database)
            .field("cookie_key", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

fn decode_cookie_key(secret: &str) -> Result<Key> {
    let secret_bytes = STANDARD
        .decode(secret.trim())
        .context("invalid COOKIE_SECRET_BASE64")?;
    if secret_bytes.len() < COOKIE_KEY_LEN {
        return Err(anyhow!(
            "COOKIE_SECRET_BASE64 must decode to at least {COOKIE_KEY_LEN} bytes"
        ));
    }
    Key::try_from(&secret_bytes[..COOKIE_KEY_LEN])
        .map_err(|err| anyhow!("unusable COOKIE_SECRET_BASE64: {err}"))
}
