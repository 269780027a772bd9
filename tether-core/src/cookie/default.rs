//! Default session cookie policy

use super::validation::{validate_cookie_name, validate_cookie_value, validate_domain, validate_path};
use super::{CookieSerializer, CookieValue, SESSION_COOKIE_MAX_AGE};
use crate::error::{SessionError, SessionResult};
use crate::http::RequestHead;
use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use chrono::{Duration, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

/// Standard alphabet, padded on encode, padding optional on decode
const COOKIE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Cookie serializer with configurable attribute policy
///
/// Defaults: name `SESSION`, path = context path + "/", Secure when the
/// request is secure, HttpOnly, `SameSite=Lax`, Base64-encoded value,
/// session-lifetime cookie (no Max-Age).
///
/// # Example
///
/// ```
/// use tether_core::cookie::DefaultCookieSerializer;
///
/// let serializer = DefaultCookieSerializer::new()
///     .with_cookie_name("app_session")?
///     .with_domain_name_pattern(r"^.+?\.(\w+\.[a-z]+)$")?
///     .with_jvm_route("node1");
/// # Ok::<(), tether_core::SessionError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DefaultCookieSerializer {
    cookie_name: String,
    use_secure_cookie: Option<bool>,
    use_http_only_cookie: bool,
    cookie_path: Option<String>,
    cookie_max_age: Option<i32>,
    domain_name: Option<String>,
    domain_name_pattern: Option<Regex>,
    jvm_route: Option<String>,
    use_base64_encoding: bool,
    remember_me_request_attribute: Option<String>,
    same_site: Option<String>,
}

impl Default for DefaultCookieSerializer {
    fn default() -> Self {
        Self {
            cookie_name: "SESSION".to_string(),
            use_secure_cookie: None,
            use_http_only_cookie: true,
            cookie_path: None,
            cookie_max_age: None,
            domain_name: None,
            domain_name_pattern: None,
            jvm_route: None,
            use_base64_encoding: true,
            remember_me_request_attribute: None,
            same_site: Some("Lax".to_string()),
        }
    }
}

impl DefaultCookieSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> SessionResult<Self> {
        let name = name.into();
        validate_cookie_name(&name)?;
        self.cookie_name = name;
        Ok(self)
    }

    /// Force the Secure attribute on or off instead of following the request
    pub fn with_use_secure_cookie(mut self, secure: bool) -> Self {
        self.use_secure_cookie = Some(secure);
        self
    }

    pub fn with_use_http_only_cookie(mut self, http_only: bool) -> Self {
        self.use_http_only_cookie = http_only;
        self
    }

    /// Fixed cookie path instead of the request's context path
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = Some(path.into());
        self
    }

    /// Default max-age in seconds when the write does not specify one
    pub fn with_cookie_max_age(mut self, max_age: i32) -> Self {
        self.cookie_max_age = Some(max_age);
        self
    }

    /// Fixed Domain attribute. Conflicts with a domain pattern.
    pub fn with_domain_name(mut self, domain: impl Into<String>) -> SessionResult<Self> {
        if self.domain_name_pattern.is_some() {
            return Err(conflicting_domain());
        }
        let domain = domain.into();
        validate_domain(&domain)?;
        self.domain_name = Some(domain);
        Ok(self)
    }

    /// Derive the Domain attribute from the first capture group of a
    /// case-insensitive pattern matched against the whole server name.
    /// Conflicts with a fixed domain name.
    pub fn with_domain_name_pattern(mut self, pattern: &str) -> SessionResult<Self> {
        if self.domain_name.is_some() {
            return Err(conflicting_domain());
        }
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| SessionError::Config(format!("invalid domain name pattern: {}", e)))?;
        self.domain_name_pattern = Some(regex);
        Ok(self)
    }

    /// Suffix appended to every value as `.route` for sticky load balancing
    pub fn with_jvm_route(mut self, route: impl AsRef<str>) -> Self {
        self.jvm_route = Some(format!(".{}", route.as_ref()));
        self
    }

    pub fn with_use_base64_encoding(mut self, enabled: bool) -> Self {
        self.use_base64_encoding = enabled;
        self
    }

    /// Request attribute that, when set to a truthy value, makes the cookie persistent
    pub fn with_remember_me_request_attribute(mut self, name: impl Into<String>) -> Self {
        self.remember_me_request_attribute = Some(name.into());
        self
    }

    pub fn with_same_site(mut self, same_site: impl Into<String>) -> Self {
        self.same_site = Some(same_site.into());
        self
    }

    /// Omit the SameSite attribute
    pub fn without_same_site(mut self) -> Self {
        self.same_site = None;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn encode(&self, logical: &str) -> String {
        if logical.is_empty() {
            return String::new();
        }
        let routed = match &self.jvm_route {
            Some(route) => format!("{}{}", logical, route),
            None => logical.to_string(),
        };
        if self.use_base64_encoding {
            COOKIE_BASE64.encode(routed)
        } else {
            routed
        }
    }

    fn decode(&self, raw: &str) -> Option<String> {
        let mut value = if self.use_base64_encoding {
            let bytes = match COOKIE_BASE64.decode(raw) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::debug!("Skipping {} cookie with invalid Base64 value: {}", self.cookie_name, e);
                    return None;
                }
            };
            match String::from_utf8(bytes) {
                Ok(value) => value,
                Err(_) => {
                    log::debug!("Skipping {} cookie with non UTF-8 value", self.cookie_name);
                    return None;
                }
            }
        } else {
            raw.to_string()
        };

        if let Some(route) = &self.jvm_route {
            if let Some(stripped) = value.strip_suffix(route.as_str()) {
                value = stripped.to_string();
            }
        }
        if value.is_empty() {
            return None;
        }
        Some(value)
    }

    fn effective_max_age(&self, value: &CookieValue<'_>) -> i32 {
        if value.cookie_value().is_empty() {
            return 0;
        }
        let requested = value.cookie_max_age();
        if requested >= 0 {
            return requested;
        }
        if self.is_remember_me(value.request()) {
            return i32::MAX;
        }
        self.cookie_max_age.unwrap_or(SESSION_COOKIE_MAX_AGE)
    }

    fn is_remember_me(&self, request: &dyn RequestHead) -> bool {
        let Some(name) = &self.remember_me_request_attribute else {
            return false;
        };
        !matches!(request.attributes().get(name), None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    fn domain_for(&self, request: &dyn RequestHead) -> Option<String> {
        if let Some(domain) = &self.domain_name {
            return Some(domain.clone());
        }
        let pattern = self.domain_name_pattern.as_ref()?;
        let server_name = request.server_name()?;
        let captures = pattern.captures(server_name)?;
        captures.get(1).map(|m| m.as_str().to_string())
    }

    fn path_for(&self, request: &dyn RequestHead) -> String {
        match &self.cookie_path {
            Some(path) => path.clone(),
            None => format!("{}/", request.context_path()),
        }
    }

    /// Build the Set-Cookie header value for one write
    fn build_set_cookie(&self, value: &CookieValue<'_>) -> SessionResult<String> {
        let request = value.request();
        let encoded = self.encode(value.cookie_value());
        validate_cookie_value(&encoded)?;

        let mut parts = vec![format!("{}={}", self.cookie_name, encoded)];

        // Max-Age and Expires
        let max_age = self.effective_max_age(value);
        if max_age > -1 {
            parts.push(format!("Max-Age={}", max_age));
            let expires = if max_age == 0 {
                EPOCH_EXPIRES.to_string()
            } else {
                let at = Utc::now() + Duration::seconds(i64::from(max_age));
                at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
            };
            parts.push(format!("Expires={}", expires));
        }

        // Domain
        if let Some(domain) = self.domain_for(request) {
            validate_domain(&domain)?;
            parts.push(format!("Domain={}", domain));
        }

        // Path
        let path = self.path_for(request);
        validate_path(&path)?;
        parts.push(format!("Path={}", path));

        // Secure
        if self.use_secure_cookie.unwrap_or_else(|| request.is_secure()) {
            parts.push("Secure".to_string());
        }

        // HttpOnly
        if self.use_http_only_cookie {
            parts.push("HttpOnly".to_string());
        }

        // SameSite
        if let Some(same_site) = &self.same_site {
            parts.push(format!("SameSite={}", same_site));
        }

        Ok(parts.join("; "))
    }
}

fn conflicting_domain() -> SessionError {
    SessionError::ConflictingConfig("Cannot set both domainName and domainNamePattern".to_string())
}

impl CookieSerializer for DefaultCookieSerializer {
    fn read_cookie_values(&self, request: &dyn RequestHead) -> Vec<String> {
        request
            .cookies()
            .into_iter()
            .filter(|(name, _)| *name == self.cookie_name)
            .filter_map(|(_, value)| self.decode(&value))
            .collect()
    }

    fn write_cookie_value(&self, mut value: CookieValue<'_>) -> SessionResult<()> {
        let header = self.build_set_cookie(&value)?;
        value.response().add_header("Set-Cookie", &header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse, ResponseSink};

    fn request_with_cookie(cookie: Option<&str>) -> HttpRequest {
        let mut builder = http::Request::builder().uri("http://example.com/");
        if let Some(cookie) = cookie {
            builder = builder.header("Cookie", cookie);
        }
        HttpRequest::from(builder.body(()).unwrap())
    }

    fn write(serializer: &DefaultCookieSerializer, request: &HttpRequest, value: &str) -> String {
        let mut response = HttpResponse::new();
        serializer.write_cookie_value(CookieValue::new(request, &mut response, value)).unwrap();
        response.header("Set-Cookie").unwrap()
    }

    fn cookie_value(set_cookie: &str) -> &str {
        let pair = set_cookie.split(';').next().unwrap();
        pair.split_once('=').unwrap().1
    }

    #[test]
    fn test_default_write() {
        let serializer = DefaultCookieSerializer::new();
        let request = request_with_cookie(None);
        let header = write(&serializer, &request, "abc");

        assert!(header.starts_with("SESSION=YWJj; "));
        assert!(!header.contains("Max-Age"));
        assert!(!header.contains("Expires"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(!header.contains("Secure"));
        assert!(!header.contains("Domain"));
    }

    #[test]
    fn test_round_trip() {
        let id = "5b1f5c3e-3ad4-4c53-8c2f-ef3a2b0e7f11";
        let variants = [
            DefaultCookieSerializer::new(),
            DefaultCookieSerializer::new().with_use_base64_encoding(false),
            DefaultCookieSerializer::new().with_jvm_route("node1"),
            DefaultCookieSerializer::new().with_use_base64_encoding(false).with_jvm_route("node1"),
        ];
        for serializer in variants {
            let header = write(&serializer, &request_with_cookie(None), id);
            let cookie = format!("SESSION={}", cookie_value(&header));
            let request = request_with_cookie(Some(&cookie));
            assert_eq!(serializer.read_cookie_values(&request), vec![id.to_string()]);
        }
    }

    #[test]
    fn test_jvm_route_is_appended() {
        let serializer = DefaultCookieSerializer::new().with_use_base64_encoding(false).with_jvm_route("n1");
        let header = write(&serializer, &request_with_cookie(None), "abc");
        assert!(header.starts_with("SESSION=abc.n1;"));
    }

    #[test]
    fn test_read_multiple_and_skips_invalid_base64() {
        let serializer = DefaultCookieSerializer::new();
        let request = request_with_cookie(Some("SESSION=YWJj; other=eHl6; SESSION=!!!; SESSION=ZGVm"));
        assert_eq!(serializer.read_cookie_values(&request), vec!["abc", "def"]);
    }

    #[test]
    fn test_read_accepts_unpadded_base64() {
        let serializer = DefaultCookieSerializer::new();
        let request = request_with_cookie(Some("SESSION=YWI"));
        assert_eq!(serializer.read_cookie_values(&request), vec!["ab"]);
    }

    #[test]
    fn test_read_without_cookie() {
        let serializer = DefaultCookieSerializer::new();
        assert!(serializer.read_cookie_values(&request_with_cookie(None)).is_empty());
        assert!(serializer.read_cookie_values(&request_with_cookie(Some("SESSION="))).is_empty());
    }

    #[test]
    fn test_expiry_write() {
        let serializer = DefaultCookieSerializer::new().with_cookie_max_age(3600);
        let header = write(&serializer, &request_with_cookie(None), "");
        assert!(header.starts_with("SESSION=; "));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn test_max_age_precedence() {
        let serializer = DefaultCookieSerializer::new()
            .with_remember_me_request_attribute("remember-me")
            .with_cookie_max_age(60);
        let request = request_with_cookie(None);

        // configured default
        assert!(write(&serializer, &request, "abc").contains("Max-Age=60;"));

        // remember-me beats the default
        request.attributes().set("remember-me", true);
        let header = write(&serializer, &request, "abc");
        assert!(header.contains(&format!("Max-Age={};", i32::MAX)));

        // explicit override beats remember-me
        let mut response = HttpResponse::new();
        let value = CookieValue::new(&request, &mut response, "abc").with_cookie_max_age(10);
        serializer.write_cookie_value(value).unwrap();
        assert!(response.header("Set-Cookie").unwrap().contains("Max-Age=10;"));

        // falsy remember-me is ignored
        request.attributes().set("remember-me", false);
        assert!(write(&serializer, &request, "abc").contains("Max-Age=60;"));
    }

    #[test]
    fn test_secure_follows_request() {
        let serializer = DefaultCookieSerializer::new();
        let request = HttpRequest::from(http::Request::builder().uri("https://example.com/").body(()).unwrap());
        assert!(write(&serializer, &request, "abc").contains("; Secure"));

        let serializer = serializer.with_use_secure_cookie(false);
        assert!(!write(&serializer, &request, "abc").contains("Secure"));
    }

    #[test]
    fn test_path_from_context_path() {
        let serializer = DefaultCookieSerializer::new();
        let request = request_with_cookie(None).with_context_path("/shop");
        assert!(write(&serializer, &request, "abc").contains("Path=/shop/"));

        let serializer = serializer.with_cookie_path("/custom");
        assert!(write(&serializer, &request, "abc").contains("Path=/custom"));
    }

    #[test]
    fn test_domain_name_pattern() {
        let serializer = DefaultCookieSerializer::new()
            .with_domain_name_pattern(r".+?\.(\w+\.[a-z]+)")
            .unwrap();
        let request = HttpRequest::from(
            http::Request::builder().uri("/").header("Host", "Child.Example.COM").body(()).unwrap(),
        );
        assert!(write(&serializer, &request, "abc").contains("Domain=Example.COM"));

        let request = HttpRequest::from(
            http::Request::builder().uri("/").header("Host", "localhost").body(()).unwrap(),
        );
        assert!(!write(&serializer, &request, "abc").contains("Domain"));
    }

    #[test]
    fn test_domain_options_are_exclusive() {
        let result = DefaultCookieSerializer::new()
            .with_domain_name("example.com")
            .unwrap()
            .with_domain_name_pattern(".*");
        assert!(matches!(result, Err(SessionError::ConflictingConfig(_))));

        let result = DefaultCookieSerializer::new()
            .with_domain_name_pattern(".*")
            .unwrap()
            .with_domain_name("example.com");
        assert!(matches!(result, Err(SessionError::ConflictingConfig(_))));
    }

    #[test]
    fn test_same_site() {
        let request = request_with_cookie(None);
        let serializer = DefaultCookieSerializer::new().with_same_site("Strict");
        assert!(write(&serializer, &request, "abc").ends_with("SameSite=Strict"));

        let serializer = serializer.without_same_site();
        assert!(!write(&serializer, &request, "abc").contains("SameSite"));
    }

    #[test]
    fn test_invalid_cookie_name() {
        assert!(matches!(
            DefaultCookieSerializer::new().with_cookie_name(""),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_value_rejected_at_write() {
        let serializer = DefaultCookieSerializer::new().with_use_base64_encoding(false);
        let request = request_with_cookie(None);
        let mut response = HttpResponse::new();
        let result = serializer.write_cookie_value(CookieValue::new(&request, &mut response, "a;b"));
        assert!(matches!(result, Err(SessionError::InvalidCookie(_))));
        assert!(response.header("Set-Cookie").is_none());
    }
}
