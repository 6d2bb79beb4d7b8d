use serde::{Deserialize, Serialize, Serializer};

pub const NO_WEBGL: &str = "no-webgl";
pub const WEBGL_AVAILABLE: &str = "webgl-available";
pub const NO_PLUGINS: &str = "no-plugins";
pub const FONTS_NOT_PROBED: &str = "not-implemented";
pub const DNT_UNSPECIFIED: &str = "unspecified";

/// Device/environment signals a client reports for fingerprinting.
///
/// Field order and camelCase names are part of the hash input, so a
/// browser computing the same structure locally gets the same fingerprint.
/// Every field is optional on the wire; signals that were unavailable fall
/// back to the sentinel defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FingerprintSignals {
    pub user_agent: String,
    pub language: String,
    pub languages: String,
    pub platform: String,
    pub hardware_concurrency: u32,
    #[serde(serialize_with = "js_number")]
    pub device_memory: f64,
    pub screen_resolution: String,
    pub color_depth: u32,
    #[serde(serialize_with = "js_number")]
    pub pixel_ratio: f64,
    pub timezone: String,
    pub timezone_offset: i32,
    pub canvas: String,
    pub webgl: String,
    pub plugins: String,
    pub fonts: String,
    pub local_storage: bool,
    pub session_storage: bool,
    #[serde(rename = "indexedDB")]
    pub indexed_db: bool,
    pub cookies_enabled: bool,
    pub do_not_track: String,
}

impl Default for FingerprintSignals {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            language: String::new(),
            languages: String::new(),
            platform: String::new(),
            hardware_concurrency: 0,
            device_memory: 0.0,
            screen_resolution: String::new(),
            color_depth: 0,
            pixel_ratio: 0.0,
            timezone: String::new(),
            timezone_offset: 0,
            canvas: String::new(),
            webgl: NO_WEBGL.to_string(),
            plugins: NO_PLUGINS.to_string(),
            fonts: FONTS_NOT_PROBED.to_string(),
            local_storage: false,
            session_storage: false,
            indexed_db: false,
            cookies_enabled: false,
            do_not_track: DNT_UNSPECIFIED.to_string(),
        }
    }
}

/// Integral floats serialize without a fractional part (`1`, not `1.0`),
/// matching how a browser stringifies numbers.
fn js_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        serializer.serialize_i64(*value as i64)
    } else if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_sentinels() {
        let signals: FingerprintSignals =
            serde_json::from_str(r#"{"userAgent":"curl/8.0"}"#).unwrap();
        assert_eq!(signals.user_agent, "curl/8.0");
        assert_eq!(signals.webgl, NO_WEBGL);
        assert_eq!(signals.plugins, NO_PLUGINS);
        assert_eq!(signals.do_not_track, DNT_UNSPECIFIED);
    }

    #[test]
    fn integral_floats_serialize_like_integers() {
        let signals = FingerprintSignals {
            pixel_ratio: 2.0,
            device_memory: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&signals).unwrap();
        assert!(json.contains("\"pixelRatio\":2,"));
        assert!(json.contains("\"deviceMemory\":0.5,"));
        assert!(json.contains("\"indexedDB\":false"));
    }
}
