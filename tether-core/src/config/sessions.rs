//! Sessions configuration

use crate::cookie::DefaultCookieSerializer;
use crate::error::{SessionError, SessionResult};
use crate::filter::SessionRepositoryFilter;
use crate::resolver::{
    CompositeSessionIdResolver, CookieSessionIdResolver, CrawlerSessionIdResolver, HeaderSessionIdResolver,
    SessionIdResolver, DEFAULT_CRAWLER_USER_AGENTS, X_AUTH_TOKEN,
};
use crate::session::{MapSessionRepository, SessionManagerConfig, SessionRepository, DEFAULT_MAX_INACTIVE_INTERVAL_SECS};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How the session id travels between client and server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionTransport {
    #[serde(rename = "cookie")]
    Cookie,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "cookie+header")]
    CookieAndHeader,
}

impl FromStr for SessionTransport {
    type Err = SessionError;

    fn from_str(s: &str) -> SessionResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(SessionTransport::Cookie),
            "header" => Ok(SessionTransport::Header),
            "cookie+header" => Ok(SessionTransport::CookieAndHeader),
            other => Err(SessionError::Config(format!(
                "Unknown session transport '{}': expected cookie, header or cookie+header",
                other
            ))),
        }
    }
}

impl fmt::Display for SessionTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionTransport::Cookie => "cookie",
            SessionTransport::Header => "header",
            SessionTransport::CookieAndHeader => "cookie+header",
        };
        f.write_str(name)
    }
}

/// Sessions configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Session cookie name
    /// Env: TETHER_SESSION_COOKIE_NAME
    /// Default: "SESSION"
    pub cookie_name: String,

    /// Cookie path
    /// Env: TETHER_SESSION_COOKIE_PATH
    /// Default: None (context path + "/")
    pub cookie_path: Option<String>,

    /// Fixed cookie domain
    /// Env: TETHER_SESSION_COOKIE_DOMAIN
    /// Default: None
    pub cookie_domain: Option<String>,

    /// Regex whose first group, matched against the server name, is the domain
    /// Env: TETHER_SESSION_COOKIE_DOMAIN_PATTERN
    /// Default: None
    pub cookie_domain_pattern: Option<String>,

    /// Secure flag
    /// Env: TETHER_SESSION_COOKIE_SECURE
    /// Default: None (follows the request)
    pub cookie_secure: Option<bool>,

    /// HttpOnly flag
    /// Env: TETHER_SESSION_COOKIE_HTTP_ONLY
    /// Default: true
    pub cookie_http_only: bool,

    /// SameSite policy; empty string omits the attribute
    /// Env: TETHER_SESSION_COOKIE_SAME_SITE
    /// Default: "Lax"
    pub cookie_same_site: String,

    /// Cookie Max-Age in seconds
    /// Env: TETHER_SESSION_COOKIE_MAX_AGE
    /// Default: None (-1, browser session)
    pub cookie_max_age: Option<i32>,

    /// Base64-encode the cookie value
    /// Env: TETHER_SESSION_COOKIE_BASE64
    /// Default: true
    pub cookie_base64: bool,

    /// Sticky-routing suffix appended to the cookie value
    /// Env: TETHER_SESSION_JVM_ROUTE
    /// Default: None
    pub jvm_route: Option<String>,

    /// Request attribute that turns the cookie into a long-lived one
    /// Env: TETHER_SESSION_REMEMBER_ME_ATTRIBUTE
    /// Default: None
    pub remember_me_attribute: Option<String>,

    /// Id transport: "cookie", "header" or "cookie+header"
    /// Env: TETHER_SESSION_TRANSPORT
    /// Default: "cookie"
    pub transport: SessionTransport,

    /// Header names used by the header transport
    /// Env: TETHER_SESSION_HEADER_NAMES (comma-separated)
    /// Default: ["X-Auth-Token"]
    pub header_names: Vec<String>,

    /// Pin crawlers to one session per client IP
    /// Env: TETHER_SESSION_CRAWLER_ENABLED
    /// Default: false
    pub crawler_enabled: bool,

    /// User-Agent regex identifying crawlers
    /// Env: TETHER_SESSION_CRAWLER_USER_AGENTS
    pub crawler_user_agents: String,

    /// Maximum number of crawler IPs remembered
    /// Env: TETHER_SESSION_CRAWLER_CACHE_CAPACITY
    /// Default: 10000
    pub crawler_cache_capacity: usize,

    /// Seconds a crawler IP is remembered without activity
    /// Env: TETHER_SESSION_CRAWLER_CACHE_TTL
    /// Default: 1800
    pub crawler_cache_ttl_secs: u64,

    /// Session inactivity timeout in seconds; negative never expires
    /// Env: TETHER_SESSION_MAX_INACTIVE_INTERVAL
    /// Default: 1800
    pub max_inactive_interval_secs: i64,

    /// Expired session sweep interval in seconds
    /// Env: TETHER_SESSION_CLEANUP_INTERVAL
    /// Default: 300
    pub cleanup_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            cookie_name: "SESSION".to_string(),
            cookie_path: None,
            cookie_domain: None,
            cookie_domain_pattern: None,
            cookie_secure: None,
            cookie_http_only: true,
            cookie_same_site: "Lax".to_string(),
            cookie_max_age: None,
            cookie_base64: true,
            jvm_route: None,
            remember_me_attribute: None,
            transport: SessionTransport::Cookie,
            header_names: vec![X_AUTH_TOKEN.to_string()],
            crawler_enabled: false,
            crawler_user_agents: DEFAULT_CRAWLER_USER_AGENTS.to_string(),
            crawler_cache_capacity: 10_000,
            crawler_cache_ttl_secs: 1800,
            max_inactive_interval_secs: DEFAULT_MAX_INACTIVE_INTERVAL_SECS,
            cleanup_interval_secs: 300,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

fn env_optional(name: &str) -> Option<Option<String>> {
    let value = env::var(name).ok()?;
    let value = value.trim();
    Some(if value.is_empty() { None } else { Some(value.to_string()) })
}

impl SessionsConfig {
    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    /// Apply environment variables
    pub fn apply_env_vars(&mut self) {
        if let Ok(name) = env::var("TETHER_SESSION_COOKIE_NAME") {
            self.cookie_name = name;
        }
        if let Some(path) = env_optional("TETHER_SESSION_COOKIE_PATH") {
            self.cookie_path = path;
        }
        if let Some(domain) = env_optional("TETHER_SESSION_COOKIE_DOMAIN") {
            self.cookie_domain = domain;
        }
        if let Some(pattern) = env_optional("TETHER_SESSION_COOKIE_DOMAIN_PATTERN") {
            self.cookie_domain_pattern = pattern;
        }
        if let Some(secure) = env_parse("TETHER_SESSION_COOKIE_SECURE") {
            self.cookie_secure = Some(secure);
        }
        if let Some(http_only) = env_parse("TETHER_SESSION_COOKIE_HTTP_ONLY") {
            self.cookie_http_only = http_only;
        }
        if let Ok(same_site) = env::var("TETHER_SESSION_COOKIE_SAME_SITE") {
            self.cookie_same_site = same_site.trim().to_string();
        }
        if let Some(max_age) = env_parse("TETHER_SESSION_COOKIE_MAX_AGE") {
            self.cookie_max_age = Some(max_age);
        }
        if let Some(base64) = env_parse("TETHER_SESSION_COOKIE_BASE64") {
            self.cookie_base64 = base64;
        }
        if let Some(route) = env_optional("TETHER_SESSION_JVM_ROUTE") {
            self.jvm_route = route;
        }
        if let Some(attribute) = env_optional("TETHER_SESSION_REMEMBER_ME_ATTRIBUTE") {
            self.remember_me_attribute = attribute;
        }
        if let Ok(transport) = env::var("TETHER_SESSION_TRANSPORT") {
            match transport.parse() {
                Ok(transport) => self.transport = transport,
                Err(e) => log::warn!("Ignoring TETHER_SESSION_TRANSPORT: {}", e),
            }
        }
        if let Ok(names) = env::var("TETHER_SESSION_HEADER_NAMES") {
            self.header_names = names
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(enabled) = env_parse("TETHER_SESSION_CRAWLER_ENABLED") {
            self.crawler_enabled = enabled;
        }
        if let Ok(pattern) = env::var("TETHER_SESSION_CRAWLER_USER_AGENTS") {
            self.crawler_user_agents = pattern;
        }
        if let Some(capacity) = env_parse("TETHER_SESSION_CRAWLER_CACHE_CAPACITY") {
            self.crawler_cache_capacity = capacity;
        }
        if let Some(ttl) = env_parse("TETHER_SESSION_CRAWLER_CACHE_TTL") {
            self.crawler_cache_ttl_secs = ttl;
        }
        if let Some(interval) = env_parse("TETHER_SESSION_MAX_INACTIVE_INTERVAL") {
            self.max_inactive_interval_secs = interval;
        }
        if let Some(interval) = env_parse("TETHER_SESSION_CLEANUP_INTERVAL") {
            self.cleanup_interval_secs = interval;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cookie_name.trim().is_empty() {
            bail!("Invalid cookie_name: must not be empty");
        }

        if self.cookie_domain.is_some() && self.cookie_domain_pattern.is_some() {
            bail!("Invalid cookie domain: set cookie_domain or cookie_domain_pattern, not both");
        }

        let same_site = self.cookie_same_site.as_str();
        if !same_site.is_empty() && !["Strict", "Lax", "None"].iter().any(|v| v.eq_ignore_ascii_case(same_site)) {
            bail!("Invalid cookie_same_site: must be Strict, Lax, None or empty");
        }

        if self.transport != SessionTransport::Cookie && self.header_names.is_empty() {
            bail!("Invalid header_names: the {} transport needs at least one header", self.transport);
        }

        if self.crawler_enabled && self.crawler_cache_capacity == 0 {
            bail!("Invalid crawler_cache_capacity: must be greater than 0");
        }

        if self.cleanup_interval_secs == 0 {
            bail!("Invalid cleanup_interval_secs: must be greater than 0");
        }

        Ok(())
    }

    /// Cookie serializer described by the cookie settings
    pub fn build_cookie_serializer(&self) -> SessionResult<DefaultCookieSerializer> {
        let mut serializer = DefaultCookieSerializer::new()
            .with_cookie_name(self.cookie_name.as_str())?
            .with_use_http_only_cookie(self.cookie_http_only)
            .with_use_base64_encoding(self.cookie_base64);

        if let Some(path) = &self.cookie_path {
            serializer = serializer.with_cookie_path(path.as_str());
        }
        if let Some(domain) = &self.cookie_domain {
            serializer = serializer.with_domain_name(domain.as_str())?;
        }
        if let Some(pattern) = &self.cookie_domain_pattern {
            serializer = serializer.with_domain_name_pattern(pattern)?;
        }
        if let Some(secure) = self.cookie_secure {
            serializer = serializer.with_use_secure_cookie(secure);
        }
        if let Some(max_age) = self.cookie_max_age {
            serializer = serializer.with_cookie_max_age(max_age);
        }
        if let Some(route) = &self.jvm_route {
            serializer = serializer.with_jvm_route(route);
        }
        if let Some(attribute) = &self.remember_me_attribute {
            serializer = serializer.with_remember_me_request_attribute(attribute.as_str());
        }
        serializer = if self.cookie_same_site.is_empty() {
            serializer.without_same_site()
        } else {
            serializer.with_same_site(self.cookie_same_site.as_str())
        };
        Ok(serializer)
    }

    /// Session id transport described by the transport and crawler settings
    pub fn build_resolver(&self) -> SessionResult<Arc<dyn SessionIdResolver>> {
        let mut resolvers: Vec<Arc<dyn SessionIdResolver>> = Vec::new();
        if matches!(self.transport, SessionTransport::Cookie | SessionTransport::CookieAndHeader) {
            let serializer = self.build_cookie_serializer()?;
            resolvers.push(Arc::new(CookieSessionIdResolver::with_serializer(Arc::new(serializer))));
        }
        if matches!(self.transport, SessionTransport::Header | SessionTransport::CookieAndHeader) {
            for name in &self.header_names {
                resolvers.push(Arc::new(HeaderSessionIdResolver::new(name.as_str())?));
            }
        }

        let resolver: Arc<dyn SessionIdResolver> = if resolvers.len() == 1 {
            resolvers.remove(0)
        } else {
            Arc::new(CompositeSessionIdResolver::new(resolvers)?)
        };

        if !self.crawler_enabled {
            return Ok(resolver);
        }
        let crawler = CrawlerSessionIdResolver::new(resolver)
            .with_crawler_user_agents(self.crawler_user_agents.as_str())?
            .with_cache_limits(self.crawler_cache_capacity, Duration::from_secs(self.crawler_cache_ttl_secs));
        Ok(Arc::new(crawler))
    }

    /// In-memory repository applying the configured inactivity timeout
    pub fn build_repository(&self) -> MapSessionRepository {
        MapSessionRepository::new()
            .with_default_max_inactive_interval(chrono::Duration::seconds(self.max_inactive_interval_secs))
    }

    /// Filter over `repository` using the configured transport
    pub fn build_filter(&self, repository: Arc<dyn SessionRepository>) -> SessionResult<SessionRepositoryFilter> {
        Ok(SessionRepositoryFilter::new(repository).with_resolver(self.build_resolver()?))
    }

    /// Background sweep settings
    pub fn manager_config(&self) -> SessionManagerConfig {
        SessionManagerConfig::new().with_cleanup_interval(Duration::from_secs(self.cleanup_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse, RequestHead, ResponseSink};

    fn request(header: Option<(&str, &str)>) -> HttpRequest {
        let mut builder = http::Request::builder().uri("/");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        HttpRequest::from(builder.body(()).unwrap())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport, SessionTransport::Cookie);
        assert_eq!(config.header_names, vec!["X-Auth-Token"]);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = SessionsConfig::default();
        config.cookie_domain = Some("example.com".into());
        config.cookie_domain_pattern = Some("^.+?\\.(\\w+\\.[a-z]+)$".into());
        assert!(config.validate().is_err());

        let mut config = SessionsConfig::default();
        config.cookie_same_site = "Sometimes".into();
        assert!(config.validate().is_err());

        let mut config = SessionsConfig::default();
        config.transport = SessionTransport::Header;
        config.header_names.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_transport_parsing() {
        assert_eq!("Cookie+Header".parse::<SessionTransport>().unwrap(), SessionTransport::CookieAndHeader);
        assert!(matches!("url".parse::<SessionTransport>(), Err(SessionError::Config(_))));
        assert_eq!(SessionTransport::Header.to_string(), "header");
    }

    #[test]
    fn test_empty_cookie_name_rejected_at_build() {
        let mut config = SessionsConfig::default();
        config.cookie_name = String::new();
        assert!(matches!(config.build_cookie_serializer(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_build_header_resolver() {
        let mut config = SessionsConfig::default();
        config.transport = SessionTransport::Header;
        config.header_names = vec!["X-Auth-Token".into(), "Authentication-Info".into()];
        let resolver = config.build_resolver().unwrap();

        let request = request(Some(("Authentication-Info", "abc")));
        assert_eq!(resolver.resolve_session_ids(&request), vec!["abc".to_string()]);

        let mut response = HttpResponse::new();
        resolver.set_session_id(&request, &mut response, "xyz").unwrap();
        assert_eq!(response.header("X-Auth-Token"), Some("xyz".to_string()));
        assert_eq!(response.header("Authentication-Info"), Some("xyz".to_string()));
    }

    #[test]
    fn test_build_cookie_resolver_uses_settings() {
        let mut config = SessionsConfig::default();
        config.cookie_name = "JSESSIONID".into();
        config.cookie_base64 = false;
        config.cookie_same_site = String::new();
        config.cookie_max_age = Some(60);
        let resolver = config.build_resolver().unwrap();

        let request = request(Some(("Cookie", "JSESSIONID=plain")));
        assert_eq!(resolver.resolve_session_ids(&request), vec!["plain".to_string()]);

        let mut response = HttpResponse::new();
        resolver.set_session_id(&request, &mut response, "next").unwrap();
        let cookie = response.header("Set-Cookie").unwrap();
        assert!(cookie.starts_with("JSESSIONID=next; Max-Age=60"));
        assert!(!cookie.contains("SameSite"));
    }

    #[test]
    fn test_build_crawler_resolver() {
        let mut config = SessionsConfig::default();
        config.crawler_enabled = true;
        config.crawler_cache_capacity = 2;
        assert!(config.build_resolver().is_ok());

        config.crawler_user_agents = "(".into();
        assert!(matches!(config.build_resolver(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_build_repository_interval() {
        let mut config = SessionsConfig::default();
        config.max_inactive_interval_secs = 60;
        let session = config.build_repository().create_session().unwrap();
        assert_eq!(session.max_inactive_interval(), chrono::Duration::seconds(60));
        assert_eq!(config.manager_config().cleanup_interval, Duration::from_secs(300));
    }
}
