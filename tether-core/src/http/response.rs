//! In-memory response adapter built on the `http` crate
//!
//! Mirrors the commit rules of a buffered server response: status and headers
//! are frozen once an error or redirect is sent, the buffer is flushed, the
//! body stream is flushed or closed, or the buffer fills up.

use super::ResponseSink;
use crate::error::{SessionError, SessionResult};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, LOCATION};
use http::{HeaderMap, StatusCode};

/// Default response buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffered HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    buffer_size: usize,
    committed: bool,
    closed: bool,
}

impl HttpResponse {
    /// Create a 200 OK response with the default buffer size
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a response with a specific buffer size (0 = unbuffered)
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            buffer_size,
            committed: false,
            closed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Change the status code. Ignored once the response is committed.
    pub fn set_status(&mut self, status: u16) -> SessionResult<()> {
        let status = StatusCode::from_u16(status)
            .map_err(|e| SessionError::InvalidHeader(format!("status {}: {}", status, e)))?;
        if self.committed {
            log::debug!("Ignoring status change to {} on committed response", status);
            return Ok(());
        }
        self.status = status;
        Ok(())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into an `http::Response`
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(Bytes::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    fn header_pair(name: &str, value: &str) -> SessionResult<(HeaderName, HeaderValue)> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SessionError::InvalidHeader(format!("{}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| SessionError::InvalidHeader(format!("{}: {}", name, e)))?;
        Ok((header_name, header_value))
    }

    fn declared_length(&self) -> Option<usize> {
        self.headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for HttpResponse {
    fn set_header(&mut self, name: &str, value: &str) -> SessionResult<()> {
        let (name, value) = Self::header_pair(name, value)?;
        if self.committed {
            log::debug!("Ignoring header {} on committed response", name);
            return Ok(());
        }
        self.headers.insert(name, value);
        Ok(())
    }

    fn add_header(&mut self, name: &str, value: &str) -> SessionResult<()> {
        let (name, value) = Self::header_pair(name, value)?;
        if self.committed {
            log::debug!("Ignoring header {} on committed response", name);
            return Ok(());
        }
        self.headers.append(name, value);
        Ok(())
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    fn set_content_length(&mut self, length: u64) -> SessionResult<()> {
        if self.committed {
            return Ok(());
        }
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        Ok(())
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn send_error(&mut self, status: u16, message: Option<&str>) -> SessionResult<()> {
        if self.committed {
            return Err(SessionError::IllegalState(
                "Cannot send error after the response has been committed".to_string(),
            ));
        }
        self.set_status(status)?;
        self.body.clear();
        if let Some(message) = message {
            self.body.extend_from_slice(message.as_bytes());
        }
        self.committed = true;
        Ok(())
    }

    fn send_redirect(&mut self, location: &str) -> SessionResult<()> {
        if self.committed {
            return Err(SessionError::IllegalState(
                "Cannot redirect after the response has been committed".to_string(),
            ));
        }
        let (_, value) = Self::header_pair(LOCATION.as_str(), location)?;
        self.status = StatusCode::FOUND;
        self.headers.insert(LOCATION, value);
        self.body.clear();
        self.committed = true;
        Ok(())
    }

    fn flush_buffer(&mut self) -> SessionResult<()> {
        self.committed = true;
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> SessionResult<()> {
        if self.closed {
            log::debug!("Dropping {} bytes written after close", bytes.len());
            return Ok(());
        }
        self.body.extend_from_slice(bytes);
        let buffer_full = self.buffer_size > 0 && self.body.len() >= self.buffer_size;
        let body_complete = self.declared_length().is_some_and(|length| self.body.len() >= length);
        if buffer_full || body_complete {
            self.committed = true;
        }
        Ok(())
    }

    fn flush_body(&mut self) -> SessionResult<()> {
        self.committed = true;
        Ok(())
    }

    fn close_body(&mut self) -> SessionResult<()> {
        self.committed = true;
        self.closed = true;
        Ok(())
    }

    fn is_committed(&self) -> bool {
        self.committed
    }
}
