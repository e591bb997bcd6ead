//! Cookie parsing and `Set-Cookie` construction.
//!
//! Every cookie the server writes is `HttpOnly; SameSite=Lax; Path=/`,
//! plus `Secure` in production.

use axum::http::{header, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::fmt;

pub const ACCESS_TOKEN: &str = "access_token";
pub const ACCESS_TOKEN_EXPIRES_AT: &str = "access_token_expires_at";
pub const REFRESH_TOKEN: &str = "refresh_token";

/// CSRF state for the authorization redirect
pub const AUTH_STATE: &str = "spotify_auth_state";
/// Post-login redirect path
pub const AUTH_NEXT: &str = "spotify_auth_next";

/// Collect request cookies by name.
///
/// Later duplicates win. Values are taken verbatim apart from
/// surrounding double quotes.
pub fn parse(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Percent-encode a value that may contain `;`, `,` or spaces.
pub fn encode_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse of [`encode_value`].
pub fn decode_value(value: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", value).as_bytes())
        .next()
        .map(|(_, decoded)| decoded.into_owned())
        .unwrap_or_default()
}

/// One `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: &'static str,
    pub value: String,
    pub max_age_secs: i64,
    pub secure: bool,
}

impl SetCookie {
    pub fn new(name: &'static str, value: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            name,
            value: value.into(),
            max_age_secs: max_age_secs.max(0),
            secure: false,
        }
    }

    /// Expire a cookie immediately.
    pub fn removal(name: &'static str) -> Self {
        Self::new(name, "", 0)
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn to_header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.to_string()).ok()
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            self.name, self.value, self.max_age_secs
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// Append cookies to a response's headers, skipping any that are not
/// valid header values.
pub fn append(headers: &mut HeaderMap, cookies: &[SetCookie]) {
    for cookie in cookies {
        match cookie.to_header_value() {
            Some(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            None => tracing::warn!(cookie = cookie.name, "Dropping unencodable cookie"),
        }
    }
}
