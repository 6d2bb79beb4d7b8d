//! Input checks run before anything reaches storage.
//!
//! Lengths are counted in characters and bounds are inclusive. The pattern
//! checks are heuristics: they reject input that merely looks like markup
//! injection or SQL, which includes some harmless prose.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 50_000;
pub const MAX_AUTHOR_LEN: usize = 100;
pub const MAX_COMMENT_LEN: usize = 5_000;
pub const MAX_EMAIL_LEN: usize = 255;

/// Headers attached to every HTTP response.
pub const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
];

// Hardcoded patterns; a failure here is a source bug caught by the tests below.
static XSS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)<script[^>]*>.*?</script>",
        r"(?i)on\w+\s*=",
        r"(?i)javascript:",
        r"(?i)<iframe[^>]*>",
        r"(?i)<embed[^>]*>",
        r"(?i)<object[^>]*>",
        r"(?i)<link[^>]*>",
        r"(?i)expression\s*\(",
        r"(?i)vbscript:",
        r"(?i)data:text/html",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded XSS pattern is invalid"))
    .collect()
});

static SQL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(UNION|SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|SCRIPT|JAVASCRIPT|EVAL)\b",
        r"(-{2}|/\*|\*/|;)",
        r"(?m)(--|#|/\*|\*/).*?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded SQL pattern is invalid"))
    .collect()
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("hardcoded email regex is invalid")
});

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title must be between 1 and 200 characters")]
    Title,

    #[error("Content must be between 1 and 50000 characters")]
    Content,

    #[error("Author name must be between 1 and 100 characters")]
    Author,

    #[error("Comment must be between 1 and 5000 characters")]
    Comment,

    #[error("Input contains potentially malicious content")]
    Markup,

    #[error("Input contains potentially malicious SQL patterns")]
    Sql,
}

/// Every constraint a submission violated, in check order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid input: {}", messages(.errors).join("; "))]
pub struct InvalidInput {
    pub errors: Vec<ValidationError>,
}

impl InvalidInput {
    pub fn messages(&self) -> Vec<String> {
        messages(&self.errors)
    }
}

fn messages(errors: &[ValidationError]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

fn within(s: &str, max: usize) -> bool {
    let len = s.chars().count();
    (1..=max).contains(&len)
}

pub fn validate_post_title(title: &str) -> bool {
    within(title, MAX_TITLE_LEN)
}

pub fn validate_post_content(content: &str) -> bool {
    within(content, MAX_CONTENT_LEN)
}

pub fn validate_author_name(author: &str) -> bool {
    within(author, MAX_AUTHOR_LEN)
}

pub fn validate_comment_content(content: &str) -> bool {
    within(content, MAX_COMMENT_LEN)
}

pub fn validate_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN && EMAIL_REGEX.is_match(email)
}

pub fn detect_xss_attempt(input: &str) -> bool {
    XSS_PATTERNS.iter().any(|p| p.is_match(input))
}

pub fn detect_sql_injection(input: &str) -> bool {
    SQL_PATTERNS.iter().any(|p| p.is_match(input))
}

fn check_patterns(fields: &[&str], errors: &mut Vec<ValidationError>) {
    if fields.iter().any(|f| detect_xss_attempt(f)) {
        errors.push(ValidationError::Markup);
    }
    if fields.iter().any(|f| detect_sql_injection(f)) {
        errors.push(ValidationError::Sql);
    }
}

pub fn validate_post_input(title: &str, content: &str, author: &str) -> Result<(), InvalidInput> {
    let mut errors = Vec::new();

    if !validate_post_title(title) {
        errors.push(ValidationError::Title);
    }
    if !validate_post_content(content) {
        errors.push(ValidationError::Content);
    }
    if !validate_author_name(author) {
        errors.push(ValidationError::Author);
    }
    check_patterns(&[title, content, author], &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(InvalidInput { errors })
    }
}

/// Checks only the fields an edit supplies; absent fields keep stored values.
pub fn validate_post_update(
    title: Option<&str>,
    content: Option<&str>,
    author: Option<&str>,
) -> Result<(), InvalidInput> {
    let mut errors = Vec::new();

    if title.is_some_and(|t| !validate_post_title(t)) {
        errors.push(ValidationError::Title);
    }
    if content.is_some_and(|c| !validate_post_content(c)) {
        errors.push(ValidationError::Content);
    }
    if author.is_some_and(|a| !validate_author_name(a)) {
        errors.push(ValidationError::Author);
    }
    let present: Vec<&str> = [title, content, author].into_iter().flatten().collect();
    check_patterns(&present, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(InvalidInput { errors })
    }
}

pub fn validate_comment_input(author: &str, content: &str) -> Result<(), InvalidInput> {
    let mut errors = Vec::new();

    if !validate_author_name(author) {
        errors.push(ValidationError::Author);
    }
    if !validate_comment_content(content) {
        errors.push(ValidationError::Comment);
    }
    check_patterns(&[author, content], &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(InvalidInput { errors })
    }
}

/// Escape the five HTML-significant characters.
pub fn encode_for_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape text for an HTML text node (quotes pass through).
pub fn sanitize_input(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

pub fn encode_for_url(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// 32 random bytes, hex encoded.
pub fn generate_csrf_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}
