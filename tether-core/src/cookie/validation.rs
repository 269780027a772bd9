//! RFC 6265 checks applied before a Set-Cookie header is emitted

use crate::error::{SessionError, SessionResult};

/// Cookie names must be non-empty tokens
pub(crate) fn validate_cookie_name(name: &str) -> SessionResult<()> {
    if name.is_empty() {
        return Err(SessionError::Config("cookieName cannot be null".to_string()));
    }
    let is_token_char =
        |c: char| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?={}".contains(c);
    if let Some(c) = name.chars().find(|c| !is_token_char(*c)) {
        return Err(SessionError::Config(format!(
            "Cookie name '{}' contains invalid character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// cookie-value = *cookie-octet / ( DQUOTE *cookie-octet DQUOTE )
pub(crate) fn validate_cookie_value(value: &str) -> SessionResult<()> {
    let unquoted = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    };
    let is_cookie_octet = |c: char| {
        matches!(c, '\u{21}' | '\u{23}'..='\u{2B}' | '\u{2D}'..='\u{3A}' | '\u{3C}'..='\u{5B}' | '\u{5D}'..='\u{7E}')
    };
    if let Some(c) = unquoted.chars().find(|c| !is_cookie_octet(*c)) {
        return Err(SessionError::InvalidCookie(format!(
            "value contains invalid character {:?}",
            c
        )));
    }
    Ok(())
}

/// Letters, digits, '.' and '-'; no "..", ".-" or "-."; may not start with '-'
/// or end with '.' or '-'
pub(crate) fn validate_domain(domain: &str) -> SessionResult<()> {
    let invalid = || SessionError::InvalidCookie(format!("invalid domain '{}'", domain));
    if domain.is_empty() {
        return Ok(());
    }
    if domain.starts_with('-') || domain.ends_with('.') || domain.ends_with('-') {
        return Err(invalid());
    }
    let mut previous = None;
    for c in domain.chars() {
        if !(c.is_ascii_alphanumeric() || c == '.' || c == '-') {
            return Err(invalid());
        }
        match (previous, c) {
            (Some('.'), '.') | (Some('.'), '-') | (Some('-'), '.') => return Err(invalid()),
            _ => {}
        }
        previous = Some(c);
    }
    Ok(())
}

/// Printable ASCII without ';'
pub(crate) fn validate_path(path: &str) -> SessionResult<()> {
    if let Some(c) = path.chars().find(|c| !(' '..='~').contains(c) || *c == ';') {
        return Err(SessionError::InvalidCookie(format!(
            "path contains invalid character {:?}",
            c
        )));
    }
    Ok(())
}
