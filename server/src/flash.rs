//! One-shot status messages carried across a redirect in an encrypted cookie.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration as TimeDuration;
use tracing::warn;

const FLASH_COOKIE: &str = "employee_flash";

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Appends `flash` to whatever is already pending in the jar.
pub fn push(jar: PrivateCookieJar, flash: Flash, secure: bool) -> PrivateCookieJar {
    let mut pending = pending(&jar);
    pending.push(flash);
    let value = match serde_json::to_string(&pending) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "dropping flash message");
            return jar;
        }
    };
    let cookie = Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(5))
        .build();
    jar.add(cookie)
}

/// Drains pending messages, clearing the cookie if there was one.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Vec<Flash>) {
    let pending = pending(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, pending);
    }
    let jar = jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/").build());
    (jar, pending)
}

fn pending(jar: &PrivateCookieJar) -> Vec<Flash> {
    jar.get(FLASH_COOKIE)
        .and_then(|cookie| serde_json::from_str(cookie.value()).ok())
        .unwrap_or_default()
}
