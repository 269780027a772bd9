//! Session filter
//!
//! [`SessionRepositoryFilter`] is the per-request composition root. It wraps
//! the request in a [`SessionRequest`] and the response in a
//! [`CommitAwareResponse`], runs the handler chain, and saves the session
//! either when the response commits or when the chain returns, whichever
//! comes first. The unwind save always runs and is idempotent.

use crate::error::SessionError;
use crate::http::{RequestHead, ResponseSink};
use crate::request::{SessionContext, SessionRequest};
use crate::resolver::{CookieSessionIdResolver, SessionIdResolver};
use crate::response::CommitAwareResponse;
use crate::session::SessionRepository;
use std::rc::Rc;
use std::sync::Arc;

/// Repository published on every filtered request
struct RepositoryHandle(Arc<dyn SessionRepository>);

/// Wires a repository and a session id transport into request processing
#[derive(Clone)]
pub struct SessionRepositoryFilter {
    repository: Arc<dyn SessionRepository>,
    resolver: Arc<dyn SessionIdResolver>,
}

impl SessionRepositoryFilter {
    /// Filter carrying the session id in the default `SESSION` cookie
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            repository,
            resolver: Arc::new(CookieSessionIdResolver::new()),
        }
    }

    /// Use another session id transport
    pub fn with_resolver(mut self, resolver: Arc<dyn SessionIdResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn repository(&self) -> Arc<dyn SessionRepository> {
        Arc::clone(&self.repository)
    }

    pub fn resolver(&self) -> Arc<dyn SessionIdResolver> {
        Arc::clone(&self.resolver)
    }

    /// Repository published on a request by a filter, for code that has
    /// no other handle on it
    pub fn session_repository(request: &dyn RequestHead) -> Option<Arc<dyn SessionRepository>> {
        request
            .attributes()
            .extension::<RepositoryHandle>()
            .map(|handle| Arc::clone(&handle.0))
    }

    /// Run `chain` with the session-aware request and response
    ///
    /// A nested call for the same request (an include while the outer pass is
    /// still running) shares the outer session and leaves the commit to the
    /// outer pass. A later call for the same request (an error dispatch) reuses
    /// the session and commits again.
    ///
    /// When both the chain and the final commit fail, the chain error is
    /// returned and the commit error is logged.
    pub fn do_filter<'r, Req, Res, T, E, F>(&self, request: &'r Req, response: &mut Res, chain: F) -> Result<T, E>
    where
        Req: RequestHead,
        Res: ResponseSink,
        E: From<SessionError>,
        F: FnOnce(&SessionRequest<'r, Req>, &mut CommitAwareResponse<'_>) -> Result<T, E>,
    {
        let attributes = request.attributes();
        if attributes.extension::<RepositoryHandle>().is_none() {
            attributes.insert_extension(Rc::new(RepositoryHandle(Arc::clone(&self.repository))));
        }

        let context = match attributes.extension::<SessionContext>() {
            Some(context) => context,
            None => {
                self.resolver.prepare_request(request)?;
                let context = Rc::new(SessionContext::new(Arc::clone(&self.repository), Arc::clone(&self.resolver)));
                attributes.insert_extension(Rc::clone(&context));
                context
            }
        };
        let wrapped_request = SessionRequest::new(request, Rc::clone(&context));

        if context.is_dispatching() {
            log::debug!("Nested dispatch: reusing the outer session context");
            let mut wrapped_response = CommitAwareResponse::new(response, |_| Ok(()));
            wrapped_response.disable_on_response_committed();
            return chain(&wrapped_request, &mut wrapped_response);
        }

        let _dispatch = context.enter_dispatch();
        let outcome = {
            let on_commit = Rc::clone(&context);
            let mut wrapped_response =
                CommitAwareResponse::new(response, move |sink| on_commit.commit_session(request, sink));
            chain(&wrapped_request, &mut wrapped_response)
        };
        let committed = context.commit_session(request, response);

        match (outcome, committed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(commit_error)) => {
                log::error!("Failed to commit session after request error: {}", commit_error);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::session::MapSessionRepository;

    fn request(cookie: Option<&str>) -> HttpRequest {
        let mut builder = http::Request::builder().uri("https://example.com/app/cart");
        if let Some(cookie) = cookie {
            builder = builder.header("Cookie", cookie);
        }
        HttpRequest::from(builder.body(()).unwrap()).with_context_path("/app")
    }

    #[test]
    fn test_repository_published() {
        let repository = MapSessionRepository::new();
        let filter = SessionRepositoryFilter::new(Arc::new(repository));
        let request = request(None);
        let mut response = HttpResponse::new();

        filter
            .do_filter(&request, &mut response, |request, _| {
                assert!(SessionRepositoryFilter::session_repository(request).is_some());
                Ok::<_, SessionError>(())
            })
            .unwrap();
        assert!(SessionRepositoryFilter::session_repository(&request).is_some());
    }

    #[test]
    fn test_session_cookie_written_on_unwind() {
        let repository = MapSessionRepository::new();
        let filter = SessionRepositoryFilter::new(Arc::new(repository.clone()));
        let request = request(None);
        let mut response = HttpResponse::new();

        let id = filter
            .do_filter(&request, &mut response, |request, _| {
                let session = request.session()?;
                session.set("item", 42)?;
                Ok::<_, SessionError>(session.id())
            })
            .unwrap();

        assert!(repository.find_by_id(&id).unwrap().is_some());
        let cookie = response.header("Set-Cookie").unwrap();
        assert!(cookie.starts_with("SESSION="));
        assert!(cookie.contains("Path=/app/"));
        assert!(cookie.contains("Secure"));
    }

    #[test]
    fn test_untouched_request_writes_nothing() {
        let repository = MapSessionRepository::new();
        let filter = SessionRepositoryFilter::new(Arc::new(repository.clone()));
        let request = request(None);
        let mut response = HttpResponse::new();

        filter
            .do_filter(&request, &mut response, |_, response| response.write_body(b"hello"))
            .unwrap();
        assert!(response.header("Set-Cookie").is_none());
        assert_eq!(repository.count().unwrap(), 0);
    }

    #[test]
    fn test_chain_error_still_commits() {
        let repository = MapSessionRepository::new();
        let filter = SessionRepositoryFilter::new(Arc::new(repository.clone()));
        let request = request(None);
        let mut response = HttpResponse::new();

        let result: Result<(), SessionError> = filter.do_filter(&request, &mut response, |request, _| {
            request.session()?.set("step", "checkout")?;
            Err(SessionError::IllegalState("handler failed".to_string()))
        });

        assert!(matches!(result, Err(SessionError::IllegalState(_))));
        assert_eq!(repository.count().unwrap(), 1);
        assert!(response.header("Set-Cookie").is_some());
    }

    #[test]
    fn test_nested_dispatch_shares_session() {
        let repository = MapSessionRepository::new();
        let filter = SessionRepositoryFilter::new(Arc::new(repository.clone()));
        let request = request(None);
        let mut response = HttpResponse::new();

        filter
            .do_filter(&request, &mut response, |outer, outer_response| {
                let outer_id = outer.session()?.id();
                let inner_id = filter.do_filter(outer.inner(), outer_response, |inner, _| {
                    Ok::<_, SessionError>(inner.get_session(false)?.map(|s| s.id()))
                })?;
                assert_eq!(inner_id, Some(outer_id));
                // the nested pass does not commit on its own
                assert_eq!(repository.count()?, 0);
                Ok::<_, SessionError>(())
            })
            .unwrap();
        assert_eq!(repository.count().unwrap(), 1);
        assert_eq!(response.header_values("Set-Cookie").len(), 1);
    }
}
