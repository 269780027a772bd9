//! Commit-aware response decorator
//!
//! [`CommitAwareResponse`] wraps any [`ResponseSink`] and runs a callback at
//! the first point where the wrapped response is certain to be committed:
//!
//! - `send_error`, `send_redirect`, `flush_buffer`
//! - flush or close of the body writer/stream
//! - the body reaching the declared Content-Length
//! - the body reaching the response buffer size
//!
//! The callback runs before the triggering call is delegated, so it can still
//! add headers, and it runs at most once per response.

mod format;
mod writer;

pub use format::{PlainFormatter, Printable, ValueFormatter};
pub use writer::{ResponseOutputStream, ResponseWriter};

use crate::error::SessionResult;
use crate::http::ResponseSink;
use std::sync::Arc;

/// Callback invoked with the wrapped response when it is about to commit
pub type CommitCallback<'a> = Box<dyn FnOnce(&mut dyn ResponseSink) -> SessionResult<()> + 'a>;

/// Response decorator that detects commitment
///
/// # Example
///
/// ```
/// use tether_core::http::{HttpResponse, ResponseSink};
/// use tether_core::response::CommitAwareResponse;
///
/// let mut inner = HttpResponse::new();
/// let mut response = CommitAwareResponse::new(&mut inner, |response| {
///     response.set_header("X-Committed", "yes")
/// });
/// response.send_redirect("/login")?;
/// # Ok::<(), tether_core::SessionError>(())
/// ```
pub struct CommitAwareResponse<'a> {
    delegate: &'a mut dyn ResponseSink,
    on_commit: Option<CommitCallback<'a>>,
    disable_on_commit: bool,
    content_length: u64,
    content_written: u64,
    formatter: Arc<dyn ValueFormatter>,
}

impl<'a> CommitAwareResponse<'a> {
    pub fn new<F>(delegate: &'a mut dyn ResponseSink, on_commit: F) -> Self
    where
        F: FnOnce(&mut dyn ResponseSink) -> SessionResult<()> + 'a,
    {
        Self {
            delegate,
            on_commit: Some(Box::new(on_commit)),
            disable_on_commit: false,
            content_length: 0,
            content_written: 0,
            formatter: Arc::new(PlainFormatter),
        }
    }

    /// Use a different rendering for printed values
    pub fn with_formatter(mut self, formatter: Arc<dyn ValueFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Never run the commit callback. Use when the response is handed to
    /// asynchronous processing that commits it elsewhere.
    pub fn disable_on_response_committed(&mut self) {
        self.disable_on_commit = true;
    }

    pub fn is_disable_on_response_committed(&self) -> bool {
        self.disable_on_commit
    }

    /// Body bytes accounted so far
    pub fn content_written(&self) -> u64 {
        self.content_written
    }

    /// Character writer over the body
    pub fn writer(&mut self) -> ResponseWriter<'_, 'a> {
        ResponseWriter::new(self)
    }

    /// Byte stream over the body
    pub fn output_stream(&mut self) -> ResponseOutputStream<'_, 'a> {
        ResponseOutputStream::new(self)
    }

    /// The wrapped response
    pub fn inner(&self) -> &dyn ResponseSink {
        &*self.delegate
    }

    /// Account for `length` more units about to be written
    fn track(&mut self, length: u64) -> SessionResult<()> {
        self.content_written += length;
        let body_fully_written = self.content_length > 0 && self.content_written >= self.content_length;
        let buffer_size = self.delegate.buffer_size() as u64;
        let requires_flush = buffer_size > 0 && self.content_written >= buffer_size;
        if body_fully_written || requires_flush {
            self.on_response_committed()?;
        }
        Ok(())
    }

    fn on_response_committed(&mut self) -> SessionResult<()> {
        if self.disable_on_commit {
            return Ok(());
        }
        self.disable_on_commit = true;
        match self.on_commit.take() {
            Some(callback) => callback(&mut *self.delegate),
            None => Ok(()),
        }
    }

    fn record_content_length_header(&mut self, name: &str, value: &str) -> SessionResult<()> {
        if !name.eq_ignore_ascii_case("content-length") {
            return Ok(());
        }
        match value.trim().parse::<u64>() {
            Ok(length) => {
                self.content_length = length;
                self.track(0)
            }
            Err(_) => {
                log::debug!("Ignoring unparsable Content-Length {:?}", value);
                Ok(())
            }
        }
    }
}

impl ResponseSink for CommitAwareResponse<'_> {
    fn set_header(&mut self, name: &str, value: &str) -> SessionResult<()> {
        self.delegate.set_header(name, value)?;
        self.record_content_length_header(name, value)
    }

    fn add_header(&mut self, name: &str, value: &str) -> SessionResult<()> {
        self.delegate.add_header(name, value)?;
        self.record_content_length_header(name, value)
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.delegate.header_values(name)
    }

    fn set_content_length(&mut self, length: u64) -> SessionResult<()> {
        self.delegate.set_content_length(length)?;
        self.content_length = length;
        self.track(0)
    }

    fn buffer_size(&self) -> usize {
        self.delegate.buffer_size()
    }

    fn send_error(&mut self, status: u16, message: Option<&str>) -> SessionResult<()> {
        self.on_response_committed()?;
        self.delegate.send_error(status, message)
    }

    fn send_redirect(&mut self, location: &str) -> SessionResult<()> {
        self.on_response_committed()?;
        self.delegate.send_redirect(location)
    }

    fn flush_buffer(&mut self) -> SessionResult<()> {
        self.on_response_committed()?;
        self.delegate.flush_buffer()
    }

    fn write_body(&mut self, bytes: &[u8]) -> SessionResult<()> {
        self.track(bytes.len() as u64)?;
        self.delegate.write_body(bytes)
    }

    fn flush_body(&mut self) -> SessionResult<()> {
        self.on_response_committed()?;
        self.delegate.flush_body()
    }

    fn close_body(&mut self) -> SessionResult<()> {
        self.on_response_committed()?;
        self.delegate.close_body()
    }

    fn is_committed(&self) -> bool {
        self.delegate.is_committed()
    }
}
