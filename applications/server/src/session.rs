//! Cookie-backed credential store.
//!
//! A [`CookieSession`] is built from the request's cookies, handed to a
//! `TokenManager` as its [`CredentialStore`], and after the handler runs
//! turns whatever the manager saved or cleared into `Set-Cookie` headers.

use crate::config::SessionSettings;
use crate::cookies::{self, SetCookie, ACCESS_TOKEN, ACCESS_TOKEN_EXPIRES_AT, REFRESH_TOKEN};
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use iplay_auth::{Credential, CredentialStore, Result};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    Unchanged,
    Saved(Credential),
    Cleared,
}

/// Credential carried in the browser's cookies for one request.
#[derive(Debug)]
pub struct CookieSession {
    initial: Option<Credential>,
    change: Mutex<Change>,
}

impl CookieSession {
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            initial,
            change: Mutex::new(Change::Unchanged),
        }
    }

    /// Read `access_token`, `access_token_expires_at` and `refresh_token`.
    ///
    /// A missing or unparsable expiry reads as already expired, so the next
    /// token lookup refreshes.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = cookies::parse(headers);
        let non_empty = |name: &str| jar.get(name).filter(|v| !v.is_empty()).cloned();

        let access = non_empty(ACCESS_TOKEN);
        let refresh = non_empty(REFRESH_TOKEN);
        let expires_at = jar
            .get(ACCESS_TOKEN_EXPIRES_AT)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_default();

        let initial = match (access, refresh) {
            (Some(access), refresh) => Some(Credential::new(access, refresh, expires_at)),
            (None, Some(refresh)) => Some(Credential::refresh_only(refresh)),
            (None, None) => None,
        };

        Self::new(initial)
    }

    /// Cookies to send back for whatever changed during the request.
    ///
    /// The refresh cookie is only rewritten when the token itself changed.
    pub async fn pending_cookies(
        &self,
        settings: &SessionSettings,
        secure: bool,
        now: DateTime<Utc>,
    ) -> Vec<SetCookie> {
        let change = self.change.lock().await.clone();
        let cookies = match change {
            Change::Unchanged => Vec::new(),
            Change::Cleared => vec![
                SetCookie::removal(ACCESS_TOKEN),
                SetCookie::removal(ACCESS_TOKEN_EXPIRES_AT),
                SetCookie::removal(REFRESH_TOKEN),
            ],
            Change::Saved(credential) => {
                let max_age = credential.expires_in_secs(now);
                let mut cookies = vec![
                    SetCookie::new(ACCESS_TOKEN, credential.access_token.clone(), max_age),
                    SetCookie::new(
                        ACCESS_TOKEN_EXPIRES_AT,
                        credential.expires_at.timestamp().to_string(),
                        max_age,
                    ),
                ];

                let previous = self
                    .initial
                    .as_ref()
                    .and_then(|c| c.refresh_token.as_deref());
                if let Some(refresh) = credential.refresh_token.as_deref() {
                    if previous != Some(refresh) {
                        cookies.push(SetCookie::new(
                            REFRESH_TOKEN,
                            refresh,
                            settings.refresh_token_max_age_secs,
                        ));
                    }
                }
                cookies
            }
        };

        cookies.into_iter().map(|c| c.secure(secure)).collect()
    }
}

#[async_trait]
impl CredentialStore for CookieSession {
    async fn load(&self) -> Result<Option<Credential>> {
        let change = self.change.lock().await;
        Ok(match &*change {
            Change::Unchanged => self.initial.clone(),
            Change::Saved(credential) => Some(credential.clone()),
            Change::Cleared => None,
        })
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        *self.change.lock().await = Change::Saved(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.change.lock().await = Change::Cleared;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use chrono::Duration;

    fn headers(cookie: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
        headers
    }

    fn find<'a>(cookies: &'a [SetCookie], name: &str) -> Option<&'a SetCookie> {
        cookies.iter().find(|c| c.name == name)
    }

    #[tokio::test]
    async fn reads_full_credential() {
        let session = CookieSession::from_headers(&headers(
            "access_token=a1; access_token_expires_at=2000000000; refresh_token=r1",
        ));

        let credential = session.load().await.unwrap().unwrap();
        assert_eq!(credential.access_token, "a1");
        assert_eq!(credential.refresh_token.as_deref(), Some("r1"));
        assert_eq!(credential.expires_at.timestamp(), 2_000_000_000);
    }

    #[tokio::test]
    async fn refresh_cookie_alone_is_refresh_only() {
        let session = CookieSession::from_headers(&headers("refresh_token=r1"));
        let credential = session.load().await.unwrap().unwrap();
        assert!(!credential.has_access_token());
        assert!(credential.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn no_cookies_means_no_credential() {
        let session = CookieSession::from_headers(&HeaderMap::new());
        assert!(session.load().await.unwrap().is_none());

        let untouched = session
            .pending_cookies(&SessionSettings::default(), false, Utc::now())
            .await;
        assert!(untouched.is_empty());
    }

    #[tokio::test]
    async fn saved_credential_becomes_cookies() {
        let session = CookieSession::new(None);
        let now = Utc::now();
        let credential = Credential::new("a2", Some("r2".into()), now + Duration::seconds(3600));
        session.save(&credential).await.unwrap();

        let cookies = session
            .pending_cookies(&SessionSettings::default(), true, now)
            .await;

        let access = find(&cookies, ACCESS_TOKEN).unwrap();
        assert_eq!(access.value, "a2");
        assert_eq!(access.max_age_secs, 3600);
        assert!(access.secure);

        let expiry = find(&cookies, ACCESS_TOKEN_EXPIRES_AT).unwrap();
        assert_eq!(expiry.value, credential.expires_at.timestamp().to_string());

        let refresh = find(&cookies, REFRESH_TOKEN).unwrap();
        assert_eq!(refresh.max_age_secs, 2_592_000);
    }

    #[tokio::test]
    async fn unchanged_refresh_token_is_not_rewritten() {
        let now = Utc::now();
        let session = CookieSession::new(Some(Credential::refresh_only("r1")));
        session
            .save(&Credential::new("a3", Some("r1".into()), now + Duration::seconds(60)))
            .await
            .unwrap();

        let cookies = session
            .pending_cookies(&SessionSettings::default(), false, now)
            .await;
        assert!(find(&cookies, ACCESS_TOKEN).is_some());
        assert!(find(&cookies, REFRESH_TOKEN).is_none());
    }

    #[tokio::test]
    async fn clear_removes_every_credential_cookie() {
        let session = CookieSession::from_headers(&headers("access_token=a1; refresh_token=r1"));
        session.clear().await.unwrap();
        session.clear().await.unwrap();
        assert!(session.load().await.unwrap().is_none());

        let cookies = session
            .pending_cookies(&SessionSettings::default(), false, Utc::now())
            .await;
        assert_eq!(cookies.len(), 3);
        assert!(cookies.iter().all(|c| c.max_age_secs == 0 && c.value.is_empty()));
    }
}
