//! Cookie session shared by every NSE request.
//!
//! NSE only serves its JSON APIs to clients that first visited the HTML
//! pages and replay the cookies they were given. The session is created
//! lazily, refreshed once it is older than the configured max age, and
//! released at shutdown. Concurrent callers share one session and at most
//! one refresh runs at a time.

use crate::error::{NseError, Result};
use calspread_core::NseConfig;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, SET_COOKIE, USER_AGENT};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Pages visited, in order, to obtain session cookies.
pub const WARM_UP_PATHS: [&str; 2] = ["/", "/get-quotes/derivatives?symbol=SBIN"];

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone)]
struct Session {
    cookie_header: String,
    refreshed_at: Instant,
}

impl Session {
    fn is_fresh(&self, max_age: Duration) -> bool {
        self.refreshed_at.elapsed() < max_age
    }
}

/// Owns the NSE cookie session.
#[derive(Debug)]
pub struct SessionManager {
    http: Client,
    base_url: String,
    max_age: Duration,
    session: RwLock<Option<Session>>,
}

impl SessionManager {
    /// Creates a manager without contacting NSE.
    ///
    /// # Errors
    /// Returns `NseError::Network` if the HTTP client cannot be built.
    pub fn new(config: &NseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(browser_headers())
            .build()
            .map_err(|e| NseError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_age: Duration::from_secs(config.cookie_max_age_secs),
            session: RwLock::new(None),
        })
    }

    /// Returns the `Cookie` header value for the current session, refreshing
    /// it first when missing or older than the max age.
    ///
    /// # Errors
    /// Returns an error if the warm-up requests fail.
    pub async fn cookie_header(&self) -> Result<String> {
        {
            let guard = self.session.read().await;
            if let Some(session) = guard.as_ref().filter(|s| s.is_fresh(self.max_age)) {
                return Ok(session.cookie_header.clone());
            }
        }

        let mut guard = self.session.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(session) = guard.as_ref().filter(|s| s.is_fresh(self.max_age)) {
            return Ok(session.cookie_header.clone());
        }

        let session = self.refresh().await?;
        let header = session.cookie_header.clone();
        *guard = Some(session);
        Ok(header)
    }

    /// Drops the session if it still carries `stale_cookie`, so the next
    /// request refreshes. A session refreshed in the meantime is kept.
    pub async fn invalidate(&self, stale_cookie: &str) {
        let mut guard = self.session.write().await;
        if guard
            .as_ref()
            .is_some_and(|session| session.cookie_header == stale_cookie)
        {
            warn!("NSE session rejected, forcing refresh");
            *guard = None;
        }
    }

    /// Discards the session at shutdown.
    pub async fn release(&self) {
        if self.session.write().await.take().is_some() {
            info!("NSE session released");
        }
    }

    /// True while a session is held, regardless of its age.
    pub async fn is_active(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn refresh(&self) -> Result<Session> {
        info!(base_url = %self.base_url, "Refreshing NSE session");

        let mut cookies = BTreeMap::new();
        for path in WARM_UP_PATHS {
            let url = format!("{}{}", self.base_url, path);
            debug!("GET {}", url);

            let response = self.http.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(NseError::api(status.as_u16(), format!("session warm-up failed for {path}")));
            }
            collect_cookies(response.headers(), &mut cookies);
        }

        let cookie_header = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        debug!(cookies = cookies.len(), "NSE session established");

        Ok(Session {
            cookie_header,
            refreshed_at: Instant::now(),
        })
    }
}

/// Headers NSE expects from a browser.
pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/html, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// Adds `name=value` pairs from every `Set-Cookie` header; later values win.
fn collect_cookies(headers: &HeaderMap, cookies: &mut BTreeMap<String, String>) {
    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        let pair = raw.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, max_age_secs: u64) -> NseConfig {
        NseConfig {
            base_url: server.uri(),
            cookie_max_age_secs: max_age_secs,
            ..NseConfig::default()
        }
    }

    async fn mount_warm_up(server: &MockServer, expected_refreshes: u64) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "nsit=abc123; Path=/; HttpOnly"),
            )
            .expect(expected_refreshes)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/get-quotes/derivatives"))
            .and(query_param("symbol", "SBIN"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "nseappid=xyz; Path=/; Secure"),
            )
            .expect(expected_refreshes)
            .mount(server)
            .await;
    }

    // ============================================
    // Cookie parsing
    // ============================================

    #[test]
    fn collects_name_value_pairs_only() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=two=2; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("garbage"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=3"));

        let mut cookies = BTreeMap::new();
        collect_cookies(&headers, &mut cookies);

        assert_eq!(cookies.get("a").map(String::as_str), Some("3"));
        assert_eq!(cookies.get("b").map(String::as_str), Some("two=2"));
        assert_eq!(cookies.len(), 2);
    }

    // ============================================
    // Session lifecycle
    // ============================================

    #[tokio::test]
    async fn warm_up_collects_cookies_from_both_pages() {
        let server = MockServer::start().await;
        mount_warm_up(&server, 1).await;
        let manager = SessionManager::new(&config(&server, 600)).unwrap();

        let header = manager.cookie_header().await.unwrap();

        assert_eq!(header, "nseappid=xyz; nsit=abc123");
        assert!(manager.is_active().await);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        mount_warm_up(&server, 1).await;
        let manager = Arc::new(SessionManager::new(&config(&server, 600)).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.cookie_header().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "nseappid=xyz; nsit=abc123");
        }
    }

    #[tokio::test]
    async fn expired_session_is_refreshed() {
        let server = MockServer::start().await;
        mount_warm_up(&server, 2).await;
        let manager = SessionManager::new(&config(&server, 0)).unwrap();

        manager.cookie_header().await.unwrap();
        manager.cookie_header().await.unwrap();
    }

    #[tokio::test]
    async fn invalidate_ignores_already_replaced_session() {
        let server = MockServer::start().await;
        mount_warm_up(&server, 2).await;
        let manager = SessionManager::new(&config(&server, 600)).unwrap();

        let cookie = manager.cookie_header().await.unwrap();
        manager.invalidate("old=cookie").await;
        assert!(manager.is_active().await);

        manager.invalidate(&cookie).await;
        assert!(!manager.is_active().await);
        manager.cookie_header().await.unwrap();
    }

    #[tokio::test]
    async fn release_drops_session() {
        let server = MockServer::start().await;
        mount_warm_up(&server, 1).await;
        let manager = SessionManager::new(&config(&server, 600)).unwrap();

        manager.cookie_header().await.unwrap();
        manager.release().await;

        assert!(!manager.is_active().await);
    }

    #[tokio::test]
    async fn failed_warm_up_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let manager = SessionManager::new(&config(&server, 600)).unwrap();

        let err = manager.cookie_header().await.unwrap_err();

        assert!(matches!(err, NseError::Api { status_code: 503, .. }));
        assert!(!manager.is_active().await);
    }
}
