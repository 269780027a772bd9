//! Text conversion for printed values
//!
//! Byte accounting depends on how a number or boolean is rendered, so the
//! rendering is a pluggable [`ValueFormatter`]. [`PlainFormatter`] renders
//! `true`/`false`, integers in decimal, and floats with at least one
//! fractional digit (`1.0`, `0.5`, `NaN`, `Infinity`).

/// A value handed to `print`/`println`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Printable<'a> {
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(&'a str),
    Chars(&'a [char]),
}

impl From<bool> for Printable<'_> {
    fn from(value: bool) -> Self {
        Printable::Bool(value)
    }
}

impl From<char> for Printable<'_> {
    fn from(value: char) -> Self {
        Printable::Char(value)
    }
}

impl From<i32> for Printable<'_> {
    fn from(value: i32) -> Self {
        Printable::Int(value)
    }
}

impl From<i64> for Printable<'_> {
    fn from(value: i64) -> Self {
        Printable::Long(value)
    }
}

impl From<f32> for Printable<'_> {
    fn from(value: f32) -> Self {
        Printable::Float(value)
    }
}

impl From<f64> for Printable<'_> {
    fn from(value: f64) -> Self {
        Printable::Double(value)
    }
}

impl<'a> From<&'a str> for Printable<'a> {
    fn from(value: &'a str) -> Self {
        Printable::Str(value)
    }
}

impl<'a> From<&'a String> for Printable<'a> {
    fn from(value: &'a String) -> Self {
        Printable::Str(value.as_str())
    }
}

impl<'a> From<&'a [char]> for Printable<'a> {
    fn from(value: &'a [char]) -> Self {
        Printable::Chars(value)
    }
}

/// Renders printed values to text
pub trait ValueFormatter: Send + Sync {
    fn format(&self, value: Printable<'_>) -> String;

    /// Appended by `println`
    fn line_separator(&self) -> &str {
        "\r\n"
    }
}

/// Locale-independent default rendering
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl ValueFormatter for PlainFormatter {
    fn format(&self, value: Printable<'_>) -> String {
        match value {
            Printable::Bool(b) => b.to_string(),
            Printable::Char(c) => c.to_string(),
            Printable::Int(i) => i.to_string(),
            Printable::Long(l) => l.to_string(),
            Printable::Float(f) => format_float(f64::from(f), f.is_finite(), || format!("{:?}", f)),
            Printable::Double(d) => format_float(d, d.is_finite(), || format!("{:?}", d)),
            Printable::Str(s) => s.to_string(),
            Printable::Chars(chars) => chars.iter().collect(),
        }
    }
}

fn format_float(value: f64, finite: bool, render: impl FnOnce() -> String) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if !finite {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    render()
}
