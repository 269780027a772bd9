//! Crawler-aware transport wrapper
//!
//! Crawlers rarely keep cookies, so every request would otherwise create a
//! new session. Requests whose User-Agent matches the crawler pattern are
//! pinned to one session per client IP instead.

use super::SessionIdResolver;
use crate::cache::LruCache;
use crate::error::{SessionError, SessionResult};
use crate::http::{RequestHead, ResponseSink};
use regex::Regex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_CRAWLER_USER_AGENTS: &str = ".*[bB]ot.*|.*Yahoo! Slurp.*|.*Feedfetcher-Google.*";

const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_TIME_TO_IDLE: Duration = Duration::from_secs(1800);

/// Both directions of the crawler table, kept consistent under one lock
struct CrawlerSessions {
    by_ip: LruCache<IpAddr, String>,
    by_id: HashMap<String, IpAddr>,
}

impl CrawlerSessions {
    fn forget(&mut self, displaced: Vec<(IpAddr, String)>) {
        for (ip, id) in displaced {
            if self.by_id.get(&id) == Some(&ip) {
                self.by_id.remove(&id);
            }
        }
    }

    fn purge_idle(&mut self) {
        let purged = self.by_ip.purge_idle();
        self.forget(purged);
    }
}

/// Wraps another resolver and pins crawlers to one session per client IP
pub struct CrawlerSessionIdResolver {
    delegate: Arc<dyn SessionIdResolver>,
    crawler_user_agents: String,
    pattern: Option<Regex>,
    sessions: Mutex<CrawlerSessions>,
}

impl CrawlerSessionIdResolver {
    /// Wrap `delegate` with the default crawler pattern and table bounds
    pub fn new(delegate: Arc<dyn SessionIdResolver>) -> Self {
        Self {
            delegate,
            crawler_user_agents: DEFAULT_CRAWLER_USER_AGENTS.to_string(),
            pattern: compile(DEFAULT_CRAWLER_USER_AGENTS).ok().flatten(),
            sessions: Mutex::new(CrawlerSessions {
                by_ip: LruCache::new(DEFAULT_CAPACITY).with_time_to_idle(DEFAULT_TIME_TO_IDLE),
                by_id: HashMap::new(),
            }),
        }
    }

    /// Pattern matched against the whole User-Agent. Empty disables detection.
    pub fn with_crawler_user_agents(mut self, pattern: impl Into<String>) -> SessionResult<Self> {
        let pattern = pattern.into();
        self.pattern = compile(&pattern)?;
        self.crawler_user_agents = pattern;
        Ok(self)
    }

    /// Bound the IP table: at most `capacity` clients, each dropped after
    /// `time_to_idle` without a request
    pub fn with_cache_limits(self, capacity: usize, time_to_idle: Duration) -> Self {
        {
            let mut sessions = self.sessions_lock();
            sessions.by_ip = LruCache::new(capacity).with_time_to_idle(time_to_idle);
            sessions.by_id.clear();
        }
        self
    }

    pub fn crawler_user_agents(&self) -> &str {
        &self.crawler_user_agents
    }

    /// Session id pinned to a crawler IP
    pub fn session_id_for_ip(&self, ip: IpAddr) -> Option<String> {
        self.sessions_lock().by_ip.peek(&ip).cloned()
    }

    /// Crawler IP a session id is pinned to
    pub fn client_ip_for_session_id(&self, session_id: &str) -> Option<IpAddr> {
        let sessions = self.sessions_lock();
        let ip = *sessions.by_id.get(session_id)?;
        match sessions.by_ip.peek(&ip) {
            Some(id) if id == session_id => Some(ip),
            _ => None,
        }
    }

    fn sessions_lock(&self) -> MutexGuard<'_, CrawlerSessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Client IP of a request from a known crawler
    fn crawler_ip(&self, request: &dyn RequestHead) -> Option<IpAddr> {
        let pattern = self.pattern.as_ref()?;
        let user_agents = request.header_values("user-agent");
        // More than one User-Agent: assume not a crawler
        let [user_agent] = user_agents.as_slice() else {
            return None;
        };
        if !pattern.is_match(user_agent) {
            return None;
        }
        log::debug!("Crawler detected. UserAgent={}", user_agent);
        request.remote_addr()
    }
}

fn compile(pattern: &str) -> SessionResult<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^(?:{})$", pattern))
        .map(Some)
        .map_err(|e| SessionError::Config(format!("invalid crawler user agent pattern: {}", e)))
}

impl SessionIdResolver for CrawlerSessionIdResolver {
    fn resolve_session_ids(&self, request: &dyn RequestHead) -> Vec<String> {
        if let Some(ip) = self.crawler_ip(request) {
            let mut sessions = self.sessions_lock();
            if let Some(session_id) = sessions.by_ip.get(&ip) {
                log::debug!("Resolved crawler session. SessionID={}", session_id);
                return vec![session_id.clone()];
            }
        }
        self.delegate.resolve_session_ids(request)
    }

    fn set_session_id(
        &self,
        request: &dyn RequestHead,
        response: &mut dyn ResponseSink,
        session_id: &str,
    ) -> SessionResult<()> {
        self.delegate.set_session_id(request, response, session_id)?;
        if let Some(ip) = self.crawler_ip(request) {
            let mut sessions = self.sessions_lock();
            let displaced = sessions.by_ip.insert(ip, session_id.to_string());
            sessions.forget(displaced);
            sessions.by_id.insert(session_id.to_string(), ip);
            log::debug!("New crawler session. SessionID={}", session_id);
        }
        Ok(())
    }

    fn expire_session(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()> {
        self.delegate.expire_session(request, response)?;
        if let Some(ip) = self.crawler_ip(request) {
            let mut sessions = self.sessions_lock();
            if let Some(session_id) = sessions.by_ip.remove(&ip) {
                sessions.by_id.remove(&session_id);
            }
        }
        Ok(())
    }

    fn prepare_request(&self, request: &dyn RequestHead) -> SessionResult<()> {
        self.sessions_lock().purge_idle();
        self.delegate.prepare_request(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::resolver::CookieSessionIdResolver;

    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/118.0";

    fn request(ip: &str, user_agents: &[&str]) -> HttpRequest {
        let mut builder = http::Request::builder().uri("/");
        for user_agent in user_agents {
            builder = builder.header("User-Agent", *user_agent);
        }
        HttpRequest::from(builder.body(()).unwrap()).with_remote_addr(format!("{}:4000", ip).parse().unwrap())
    }

    fn resolver() -> CrawlerSessionIdResolver {
        CrawlerSessionIdResolver::new(Arc::new(CookieSessionIdResolver::new()))
    }

    #[test]
    fn test_crawler_pinned_to_ip() {
        let resolver = resolver();
        let first = request("66.249.66.1", &[GOOGLEBOT]);
        assert!(resolver.resolve_session_ids(&first).is_empty());

        let mut response = HttpResponse::new();
        resolver.set_session_id(&first, &mut response, "bot-session").unwrap();
        // the delegate still writes its cookie
        assert!(response.header("Set-Cookie").is_some());

        let second = request("66.249.66.1", &[GOOGLEBOT]);
        assert_eq!(resolver.resolve_session_ids(&second), vec!["bot-session"]);
        assert_eq!(resolver.session_id_for_ip("66.249.66.1".parse().unwrap()), Some("bot-session".to_string()));
        assert_eq!(
            resolver.client_ip_for_session_id("bot-session"),
            Some("66.249.66.1".parse().unwrap())
        );

        let other_ip = request("66.249.66.2", &[GOOGLEBOT]);
        assert!(resolver.resolve_session_ids(&other_ip).is_empty());
    }

    #[test]
    fn test_browser_not_pinned() {
        let resolver = resolver();
        let browser = request("10.0.0.1", &[BROWSER]);
        let mut response = HttpResponse::new();
        resolver.set_session_id(&browser, &mut response, "browser-session").unwrap();

        assert!(resolver.session_id_for_ip("10.0.0.1".parse().unwrap()).is_none());
        assert!(resolver.resolve_session_ids(&request("10.0.0.1", &[BROWSER])).is_empty());
    }

    #[test]
    fn test_multiple_user_agents_not_a_crawler() {
        let resolver = resolver();
        let ambiguous = request("66.249.66.1", &[GOOGLEBOT, BROWSER]);
        let mut response = HttpResponse::new();
        resolver.set_session_id(&ambiguous, &mut response, "x").unwrap();
        assert!(resolver.session_id_for_ip("66.249.66.1".parse().unwrap()).is_none());
    }

    #[test]
    fn test_expire_removes_mapping() {
        let resolver = resolver();
        let bot = request("66.249.66.1", &[GOOGLEBOT]);
        let mut response = HttpResponse::new();
        resolver.set_session_id(&bot, &mut response, "bot-session").unwrap();

        resolver.expire_session(&bot, &mut response).unwrap();
        assert!(resolver.session_id_for_ip("66.249.66.1".parse().unwrap()).is_none());
        assert!(resolver.client_ip_for_session_id("bot-session").is_none());
    }

    #[test]
    fn test_custom_and_disabled_patterns() {
        let resolver = resolver().with_crawler_user_agents(".*Spider.*").unwrap();
        assert_eq!(resolver.crawler_user_agents(), ".*Spider.*");

        let mut response = HttpResponse::new();
        resolver.set_session_id(&request("1.1.1.1", &["BaiduSpider"]), &mut response, "s1").unwrap();
        resolver.set_session_id(&request("2.2.2.2", &[GOOGLEBOT]), &mut response, "s2").unwrap();
        assert_eq!(resolver.session_id_for_ip("1.1.1.1".parse().unwrap()), Some("s1".to_string()));
        assert!(resolver.session_id_for_ip("2.2.2.2".parse().unwrap()).is_none());

        let disabled = resolver.with_crawler_user_agents("").unwrap();
        disabled.set_session_id(&request("3.3.3.3", &["BaiduSpider"]), &mut response, "s3").unwrap();
        assert!(disabled.session_id_for_ip("3.3.3.3".parse().unwrap()).is_none());

        assert!(CrawlerSessionIdResolver::new(Arc::new(CookieSessionIdResolver::new()))
            .with_crawler_user_agents("(")
            .is_err());
    }

    #[test]
    fn test_table_is_bounded() {
        let resolver = resolver().with_cache_limits(2, Duration::from_secs(60));
        let mut response = HttpResponse::new();
        for (i, ip) in ["1.0.0.1", "1.0.0.2", "1.0.0.3"].iter().enumerate() {
            let id = format!("s{}", i);
            resolver.set_session_id(&request(ip, &[GOOGLEBOT]), &mut response, &id).unwrap();
        }

        assert!(resolver.session_id_for_ip("1.0.0.1".parse().unwrap()).is_none());
        assert!(resolver.client_ip_for_session_id("s0").is_none());
        assert_eq!(resolver.session_id_for_ip("1.0.0.3".parse().unwrap()), Some("s2".to_string()));
    }

    #[test]
    fn test_idle_entries_purged_on_prepare() {
        let resolver = resolver().with_cache_limits(8, Duration::from_millis(10));
        let bot = request("66.249.66.1", &[GOOGLEBOT]);
        let mut response = HttpResponse::new();
        resolver.set_session_id(&bot, &mut response, "bot-session").unwrap();

        std::thread::sleep(Duration::from_millis(30));
        resolver.prepare_request(&bot).unwrap();
        assert!(resolver.resolve_session_ids(&bot).is_empty());
        assert!(resolver.client_ip_for_session_id("bot-session").is_none());
    }
}
