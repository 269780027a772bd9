//! Body writer and output stream that account for every unit written
//!
//! Both count UTF-8 bytes, the unit of the buffer size and Content-Length.
//! They count before delegating, so a write that fills the declared length
//! commits the response before its bytes reach the wrapped response.

use super::format::Printable;
use super::CommitAwareResponse;
use crate::error::{SessionError, SessionResult};
use std::{fmt, io};

/// Character writer obtained from [`CommitAwareResponse::writer`]
pub struct ResponseWriter<'w, 'a> {
    response: &'w mut CommitAwareResponse<'a>,
}

impl<'w, 'a> ResponseWriter<'w, 'a> {
    pub(super) fn new(response: &'w mut CommitAwareResponse<'a>) -> Self {
        Self { response }
    }

    fn emit(&mut self, text: &str) -> SessionResult<()> {
        self.response.track(text.len() as u64)?;
        self.response.delegate.write_body(text.as_bytes())
    }

    /// Write a string
    pub fn write_str(&mut self, text: &str) -> SessionResult<()> {
        self.emit(text)
    }

    pub fn write_char(&mut self, c: char) -> SessionResult<()> {
        let mut buf = [0u8; 4];
        self.emit(c.encode_utf8(&mut buf))
    }

    pub fn write_chars(&mut self, chars: &[char]) -> SessionResult<()> {
        let text: String = chars.iter().collect();
        self.emit(&text)
    }

    /// Write the text form of a value
    pub fn print<'v>(&mut self, value: impl Into<Printable<'v>>) -> SessionResult<()> {
        let text = self.response.formatter.format(value.into());
        self.emit(&text)
    }

    /// Write the text form of a value followed by the line separator
    pub fn println<'v>(&mut self, value: impl Into<Printable<'v>>) -> SessionResult<()> {
        let formatter = &self.response.formatter;
        let text = format!("{}{}", formatter.format(value.into()), formatter.line_separator());
        self.emit(&text)
    }

    /// Write the line separator
    pub fn newline(&mut self) -> SessionResult<()> {
        let separator = self.response.formatter.line_separator().to_string();
        self.emit(&separator)
    }

    /// Write a value and return the writer for chaining
    pub fn append<'v>(&mut self, value: impl Into<Printable<'v>>) -> SessionResult<&mut Self> {
        self.print(value)?;
        Ok(self)
    }

    /// Flush; commits the response
    pub fn flush(&mut self) -> SessionResult<()> {
        self.response.on_response_committed()?;
        self.response.delegate.flush_body()
    }

    /// Close; commits the response
    pub fn close(&mut self) -> SessionResult<()> {
        self.response.on_response_committed()?;
        self.response.delegate.close_body()
    }
}

impl fmt::Write for ResponseWriter<'_, '_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.emit(s).map_err(|e| {
            log::debug!("Response write failed: {}", e);
            fmt::Error
        })
    }
}

/// Byte stream obtained from [`CommitAwareResponse::output_stream`]
pub struct ResponseOutputStream<'w, 'a> {
    response: &'w mut CommitAwareResponse<'a>,
}

impl<'w, 'a> ResponseOutputStream<'w, 'a> {
    pub(super) fn new(response: &'w mut CommitAwareResponse<'a>) -> Self {
        Self { response }
    }

    fn emit(&mut self, bytes: &[u8]) -> SessionResult<()> {
        self.response.track(bytes.len() as u64)?;
        self.response.delegate.write_body(bytes)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> SessionResult<()> {
        self.emit(bytes)
    }

    pub fn write_byte(&mut self, byte: u8) -> SessionResult<()> {
        self.emit(&[byte])
    }

    /// Write the text form of a value
    pub fn print<'v>(&mut self, value: impl Into<Printable<'v>>) -> SessionResult<()> {
        let text = self.response.formatter.format(value.into());
        self.emit(text.as_bytes())
    }

    /// Write the text form of a value followed by the line separator
    pub fn println<'v>(&mut self, value: impl Into<Printable<'v>>) -> SessionResult<()> {
        let formatter = &self.response.formatter;
        let text = format!("{}{}", formatter.format(value.into()), formatter.line_separator());
        self.emit(text.as_bytes())
    }

    /// Write the line separator
    pub fn newline(&mut self) -> SessionResult<()> {
        let separator = self.response.formatter.line_separator().to_string();
        self.emit(separator.as_bytes())
    }

    /// Flush; commits the response
    pub fn flush_stream(&mut self) -> SessionResult<()> {
        self.response.on_response_committed()?;
        self.response.delegate.flush_body()
    }

    /// Close; commits the response
    pub fn close(&mut self) -> SessionResult<()> {
        self.response.on_response_committed()?;
        self.response.delegate.close_body()
    }
}

fn to_io(error: SessionError) -> io::Error {
    match error {
        SessionError::Io(e) => e,
        other => io::Error::other(other),
    }
}

impl io::Write for ResponseOutputStream<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.emit(buf).map_err(to_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_stream().map_err(to_io)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{PlainFormatter, ValueFormatter};
    use super::*;
    use crate::http::{HttpResponse, ResponseSink};
    use std::cell::Cell;
    use std::sync::Arc;

    fn counted<'c>(
        inner: &'c mut HttpResponse,
        count: &'c Cell<u32>,
    ) -> CommitAwareResponse<'c> {
        CommitAwareResponse::new(inner, move |_| {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    #[test]
    fn test_writer_counts_utf8_bytes() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        response.set_content_length(6).unwrap();

        let mut writer = response.writer();
        writer.write_str("héll").unwrap(); // 5 bytes
        assert_eq!(count.get(), 0);
        writer.write_char('o').unwrap();
        assert_eq!(count.get(), 1);
        drop(writer);
        assert_eq!(response.content_written(), 6);
    }

    #[test]
    fn test_multibyte_text_commits_before_buffer_fills() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::with_buffer_size(8);
        let mut response = counted(&mut inner, &count);

        response.writer().write_chars(&['é', 'é', 'é']).unwrap();
        assert_eq!(count.get(), 0);
        assert!(!response.is_committed());
        response.writer().write_char('é').unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(response.content_written(), 8);
    }

    #[test]
    fn test_print_uses_string_conversion() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);

        let mut writer = response.writer();
        writer.print(true).unwrap(); // 4
        writer.print(false).unwrap(); // 5
        writer.print('c').unwrap(); // 1
        writer.print(123i32).unwrap(); // 3
        writer.print(-7i64).unwrap(); // 2
        writer.print(1.5f64).unwrap(); // 3
        writer.print(2.0f32).unwrap(); // 3
        writer.write_chars(&['a', 'b']).unwrap(); // 2
        drop(writer);

        assert_eq!(response.content_written(), 23);
        drop(response);
        assert_eq!(inner.body(), b"truefalsec123-71.52.0ab");
    }

    #[test]
    fn test_println_adds_separator() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        response.set_content_length(6).unwrap();

        let mut writer = response.writer();
        writer.println("abcd").unwrap();
        assert_eq!(count.get(), 1);
        writer.newline().unwrap();
        drop(writer);
        assert_eq!(response.content_written(), 8);
    }

    #[test]
    fn test_append_chains() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        response.writer().append("a").unwrap().append('b').unwrap().append(3i32).unwrap();
        assert_eq!(response.content_written(), 3);
    }

    #[test]
    fn test_fmt_write() {
        use std::fmt::Write as _;
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        write!(response.writer(), "{}-{}", 1, "two").unwrap();
        assert_eq!(response.content_written(), 5);
    }

    #[test]
    fn test_writer_flush_and_close_commit() {
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        let mut writer = response.writer();
        writer.flush().unwrap();
        writer.close().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_stream_counts_bytes() {
        use std::io::Write as _;
        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count);
        response.set_content_length(7).unwrap();

        let mut stream = response.output_stream();
        stream.write_all("hé".as_bytes()).unwrap(); // 3 bytes
        stream.write_byte(b'!').unwrap();
        stream.print(12i32).unwrap();
        assert_eq!(count.get(), 0);
        stream.println(true).unwrap();
        assert_eq!(count.get(), 1);
        stream.flush().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_custom_formatter() {
        struct Pinned;
        impl ValueFormatter for Pinned {
            fn format(&self, value: Printable<'_>) -> String {
                match value {
                    Printable::Double(d) => format!("{:.3}", d),
                    other => PlainFormatter.format(other),
                }
            }
            fn line_separator(&self) -> &str {
                "\n"
            }
        }

        let count = Cell::new(0);
        let mut inner = HttpResponse::new();
        let mut response = counted(&mut inner, &count).with_formatter(Arc::new(Pinned));
        response.writer().println(0.5f64).unwrap();
        assert_eq!(response.content_written(), 6);
    }
}
