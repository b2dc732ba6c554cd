use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use tracing::debug;

pub const SESSION_COOKIE_NAME: &str = "session_id";

const EXPIRED_AT_EPOCH: &str = "Expires=Thu, 01 Jan 1970 00:00:00 GMT";
const MAX_AGE_ZERO: &str = "Max-Age=0";

/// The cookie jar shared with the HTTP client, viewed through the one cookie we care about.
#[derive(Clone)]
pub struct SessionCookies {
    jar: Arc<Jar>,
    base_url: Url,
}

impl SessionCookies {
    pub fn new(jar: Arc<Jar>, base_url: Url) -> Self {
        Self { jar, base_url }
    }

    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current `session_id` value the jar would send to the API, if any.
    pub fn session_id(&self) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        find_cookie(header, SESSION_COOKIE_NAME).map(str::to_string)
    }

    /// Expires the session cookie under every domain/path it could have been set with.
    ///
    /// Cookie identity is (name, domain, path) and the attributes the server used are not
    /// visible to the client, so each plausible combination gets its own expired copy.
    /// A combination the jar rejects or that matches nothing is a silent no-op.
    pub fn expire_session(&self) {
        let Some(host) = self.base_url.host_str() else {
            return;
        };
        for attempt in deletion_attempts(SESSION_COOKIE_NAME, host, self.base_url.path()) {
            debug!("Cookie deletion attempt: {attempt}");
            self.jar.add_cookie_str(&attempt, &self.base_url);
        }
    }
}

/// Every `Set-Cookie` line needed to expire `name` for `host` under the root path and the
/// API path (plus its `/v1` default path), with bare and dotted domains, in both the
/// `Expires` and `Max-Age` forms.
pub fn deletion_attempts(name: &str, host: &str, api_path: &str) -> Vec<String> {
    let api_path = api_path.trim_end_matches('/');
    let mut paths = vec!["/".to_string()];
    if !api_path.is_empty() {
        paths.push(api_path.to_string());
        paths.push(format!("{api_path}/v1"));
    } else {
        paths.push("/v1".to_string());
    }

    let domains = [None, Some(host.to_string()), Some(format!(".{host}"))];

    let mut attempts = Vec::new();
    for path in &paths {
        for domain in &domains {
            for expiry in [EXPIRED_AT_EPOCH, MAX_AGE_ZERO] {
                let mut line = format!("{name}=; {expiry}; Path={path}");
                if let Some(domain) = domain {
                    line.push_str("; Domain=");
                    line.push_str(domain);
                }
                if !attempts.contains(&line) {
                    attempts.push(line);
                }
            }
        }
    }
    attempts
}

/// Value of `name` in a `Cookie:` header (`a=1; b=2`).
pub fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// First eight characters, enough to tell sessions apart in logs.
pub fn short_id(session_id: &str) -> String {
    let prefix: String = session_id.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies_for(base: &str) -> SessionCookies {
        SessionCookies::new(Arc::new(Jar::default()), Url::parse(base).unwrap())
    }

    #[test]
    fn test_find_cookie() {
        assert_eq!(find_cookie("a=1; session_id=xyz; b=2", "session_id"), Some("xyz"));
        assert_eq!(find_cookie("a=1", "session_id"), None);
        assert_eq!(find_cookie("", "session_id"), None);
    }

    #[test]
    fn test_deletion_attempts_cover_domains_and_paths() {
        let attempts = deletion_attempts("session_id", "localhost", "/api");
        assert!(attempts.contains(&format!("session_id=; {EXPIRED_AT_EPOCH}; Path=/")));
        assert!(attempts.contains(&"session_id=; Max-Age=0; Path=/; Domain=localhost".to_string()));
        assert!(attempts.contains(&"session_id=; Max-Age=0; Path=/; Domain=.localhost".to_string()));
        assert!(attempts.contains(&"session_id=; Max-Age=0; Path=/api".to_string()));
        assert!(attempts.contains(&"session_id=; Max-Age=0; Path=/api/v1".to_string()));
        // 3 paths x 3 domains x 2 expiry forms
        assert_eq!(attempts.len(), 18);
    }

    #[test]
    fn test_deletion_attempts_without_api_prefix() {
        let attempts = deletion_attempts("session_id", "example.com", "/");
        assert!(attempts.iter().all(|a| !a.contains("Path=//")));
        assert!(attempts.contains(&"session_id=; Max-Age=0; Path=/v1".to_string()));
    }

    #[test]
    fn test_expire_session_removes_host_only_cookie() {
        let cookies = cookies_for("http://127.0.0.1:8000/api");
        cookies.jar.add_cookie_str(
            "session_id=old-session; Path=/; Max-Age=1800; HttpOnly",
            cookies.base_url(),
        );
        assert_eq!(cookies.session_id().as_deref(), Some("old-session"));

        cookies.expire_session();
        assert_eq!(cookies.session_id(), None);
    }

    #[test]
    fn test_expire_session_removes_api_path_cookie() {
        let cookies = cookies_for("http://localhost:8000/api");
        cookies.jar.add_cookie_str(
            "session_id=scoped; Path=/api; Max-Age=1800",
            cookies.base_url(),
        );
        assert_eq!(cookies.session_id().as_deref(), Some("scoped"));

        cookies.expire_session();
        assert_eq!(cookies.session_id(), None);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567...");
        assert_eq!(short_id("abc"), "abc...");
    }
}
