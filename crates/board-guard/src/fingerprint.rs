use std::fmt;

use board_types::signals::FingerprintSignals;
use thiserror::Error;

const MAX_CANVAS_CHARS: usize = 50;
const MAX_PLUGIN_CHARS: usize = 100;
const MAX_FINGERPRINT_LEN: usize = 64;

/// Best-effort device identifier. Not unique across users and not stable
/// across browser updates; it only keys the login throttle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint is empty")]
    Empty,

    #[error("fingerprint longer than 64 characters")]
    TooLong,

    #[error("fingerprint may only contain [0-9a-z-]")]
    InvalidCharacter,
}

impl Fingerprint {
    /// Accept a fingerprint a client hashed locally.
    pub fn parse(raw: &str) -> Result<Self, FingerprintError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FingerprintError::Empty);
        }
        if raw.len() > MAX_FINGERPRINT_LEN {
            return Err(FingerprintError::TooLong);
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c == '-')
        {
            return Err(FingerprintError::InvalidCharacter);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fold a signal set into a fingerprint.
///
/// The signals are serialized to compact JSON and run through a 32-bit
/// rolling hash over UTF-16 code units, rendered in base 36.
pub fn generate(signals: &FingerprintSignals) -> Fingerprint {
    let mut signals = signals.clone();
    signals.canvas = truncate_chars(&signals.canvas, MAX_CANVAS_CHARS);
    signals.plugins = truncate_chars(&signals.plugins, MAX_PLUGIN_CHARS);

    // A plain struct of strings, numbers and bools always serializes.
    let json = serde_json::to_string(&signals).unwrap_or_default();
    Fingerprint(hash_string(&json))
}

/// Degraded signal set for callers that report nothing themselves.
pub fn signals_from_headers(
    user_agent: Option<&str>,
    accept_language: Option<&str>,
) -> FingerprintSignals {
    let languages: Vec<&str> = accept_language
        .unwrap_or_default()
        .split(',')
        .filter_map(|tag| tag.split(';').next())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect();

    FingerprintSignals {
        user_agent: user_agent.unwrap_or_default().to_string(),
        language: languages.first().copied().unwrap_or_default().to_string(),
        languages: languages.join(","),
        ..Default::default()
    }
}

pub fn hash_string(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    to_base36(hash)
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut n = i64::from(value).unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    if value < 0 {
        out.push(b'-');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_vectors() {
        assert_eq!(hash_string(""), "0");
        assert_eq!(hash_string("a"), "2p");
        assert_eq!(hash_string("hello"), "1n1e4y");
        assert_eq!(hash_string("Browser Fingerprint"), "7le27g");
        assert_eq!(hash_string("hello world, this is a longer string"), "-atozcz");
    }

    #[test]
    fn default_signals_hash_is_stable() {
        let fp = generate(&FingerprintSignals::default());
        assert_eq!(fp.as_str(), "r7quag");
        assert_eq!(generate(&FingerprintSignals::default()), fp);
    }

    #[test]
    fn different_devices_differ() {
        let a = FingerprintSignals {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".into(),
            screen_resolution: "1920x1080".into(),
            ..Default::default()
        };
        let b = FingerprintSignals {
            screen_resolution: "2560x1440".into(),
            ..a.clone()
        };
        assert_ne!(generate(&a), generate(&b));
    }

    #[test]
    fn webgl_signal_changes_the_hash() {
        use board_types::signals::{NO_WEBGL, WEBGL_AVAILABLE};

        let without = FingerprintSignals::default();
        assert_eq!(without.webgl, NO_WEBGL);
        let with_context = FingerprintSignals {
            webgl: WEBGL_AVAILABLE.into(),
            ..Default::default()
        };
        let with_renderer = FingerprintSignals {
            webgl: "ANGLE (Intel, Mesa Intel(R) UHD Graphics 620)".into(),
            ..Default::default()
        };

        assert_ne!(generate(&without), generate(&with_context));
        assert_ne!(generate(&with_context), generate(&with_renderer));
    }

    #[test]
    fn canvas_beyond_prefix_is_ignored() {
        let prefix = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAASwAAA";
        let a = FingerprintSignals {
            canvas: format!("{}AAAA", prefix),
            ..Default::default()
        };
        let b = FingerprintSignals {
            canvas: format!("{}BBBB", prefix),
            ..Default::default()
        };
        assert_eq!(generate(&a), generate(&b));
    }

    #[test]
    fn header_signals_split_languages() {
        let signals = signals_from_headers(Some("curl/8.4"), Some("pt-BR,pt;q=0.9, en;q=0.8"));
        assert_eq!(signals.user_agent, "curl/8.4");
        assert_eq!(signals.language, "pt-BR");
        assert_eq!(signals.languages, "pt-BR,pt,en");
        assert_eq!(signals.webgl, board_types::signals::NO_WEBGL);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Fingerprint::parse("  "), Err(FingerprintError::Empty));
        assert_eq!(Fingerprint::parse("ABC"), Err(FingerprintError::InvalidCharacter));
        assert_eq!(Fingerprint::parse(&"a".repeat(65)), Err(FingerprintError::TooLong));
        assert_eq!(Fingerprint::parse("-atozcz").unwrap().as_str(), "-atozcz");
    }
}
