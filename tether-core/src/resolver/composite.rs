//! Several transports at once

use super::SessionIdResolver;
use crate::error::{SessionError, SessionResult};
use crate::http::{RequestHead, ResponseSink};
use std::collections::HashSet;
use std::sync::Arc;

/// Resolves from every child in order and writes through all of them
#[derive(Clone)]
pub struct CompositeSessionIdResolver {
    resolvers: Vec<Arc<dyn SessionIdResolver>>,
}

impl CompositeSessionIdResolver {
    pub fn new(resolvers: Vec<Arc<dyn SessionIdResolver>>) -> SessionResult<Self> {
        if resolvers.is_empty() {
            return Err(SessionError::Config("resolvers cannot be empty".to_string()));
        }
        Ok(Self { resolvers })
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl SessionIdResolver for CompositeSessionIdResolver {
    fn resolve_session_ids(&self, request: &dyn RequestHead) -> Vec<String> {
        let mut seen = HashSet::new();
        self.resolvers
            .iter()
            .flat_map(|resolver| resolver.resolve_session_ids(request))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    fn set_session_id(
        &self,
        request: &dyn RequestHead,
        response: &mut dyn ResponseSink,
        session_id: &str,
    ) -> SessionResult<()> {
        for resolver in &self.resolvers {
            resolver.set_session_id(request, response, session_id)?;
        }
        Ok(())
    }

    fn expire_session(&self, request: &dyn RequestHead, response: &mut dyn ResponseSink) -> SessionResult<()> {
        for resolver in &self.resolvers {
            resolver.expire_session(request, response)?;
        }
        Ok(())
    }

    fn prepare_request(&self, request: &dyn RequestHead) -> SessionResult<()> {
        for resolver in &self.resolvers {
            resolver.prepare_request(request)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::resolver::{HeaderSessionIdResolver, AUTHENTICATION_INFO, X_AUTH_TOKEN};

    struct Fixed(Vec<&'static str>);

    impl SessionIdResolver for Fixed {
        fn resolve_session_ids(&self, _request: &dyn RequestHead) -> Vec<String> {
            self.0.iter().map(|id| id.to_string()).collect()
        }

        fn set_session_id(&self, _: &dyn RequestHead, _: &mut dyn ResponseSink, _: &str) -> SessionResult<()> {
            Ok(())
        }

        fn expire_session(&self, _: &dyn RequestHead, _: &mut dyn ResponseSink) -> SessionResult<()> {
            Ok(())
        }
    }

    fn request() -> HttpRequest {
        HttpRequest::from(http::Request::builder().uri("/").body(()).unwrap())
    }

    fn composite(children: Vec<Vec<&'static str>>) -> CompositeSessionIdResolver {
        let resolvers = children
            .into_iter()
            .map(|ids| Arc::new(Fixed(ids)) as Arc<dyn SessionIdResolver>)
            .collect();
        CompositeSessionIdResolver::new(resolvers).unwrap()
    }

    #[test]
    fn test_union_skips_empty_children() {
        let resolver = composite(vec![vec![], vec!["X"]]);
        assert_eq!(resolver.resolve_session_ids(&request()), vec!["X"]);
    }

    #[test]
    fn test_union_deduplicates() {
        let resolver = composite(vec![vec!["X"], vec!["X"]]);
        assert_eq!(resolver.resolve_session_ids(&request()), vec!["X"]);

        let resolver = composite(vec![vec!["B", "A"], vec!["A", "C"]]);
        assert_eq!(resolver.resolve_session_ids(&request()), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(CompositeSessionIdResolver::new(Vec::new()), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_fan_out() {
        let children: Vec<Arc<dyn SessionIdResolver>> = vec![
            Arc::new(HeaderSessionIdResolver::x_auth_token()),
            Arc::new(HeaderSessionIdResolver::authentication_info()),
        ];
        let resolver = CompositeSessionIdResolver::new(children).unwrap();
        let request = request();
        let mut response = HttpResponse::new();

        resolver.set_session_id(&request, &mut response, "abc").unwrap();
        assert_eq!(response.header(X_AUTH_TOKEN), Some("abc".to_string()));
        assert_eq!(response.header(AUTHENTICATION_INFO), Some("abc".to_string()));

        resolver.expire_session(&request, &mut response).unwrap();
        resolver.expire_session(&request, &mut response).unwrap();
        assert_eq!(response.header_values(X_AUTH_TOKEN), vec![""]);
        assert_eq!(response.header_values(AUTHENTICATION_INFO), vec![""]);
    }
}
