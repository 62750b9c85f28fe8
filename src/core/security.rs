use axum::http::HeaderMap;

use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Key guarding the HTTP surface. An unset key leaves the surface open.
#[derive(Debug, Clone, Default)]
pub struct ApiKey {
    value: Option<String>,
}

impl ApiKey {
    pub fn new(value: Option<String>) -> Self {
        Self {
            value: value.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.value.is_some()
    }
}

pub fn require_api_key(headers: &HeaderMap, expected: &ApiKey) -> Result<(), ApiError> {
    let Some(expected) = expected.value.as_deref() else {
        return Ok(());
    };

    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() || header_value != expected {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn require_api_key_accepts_valid_header() {
        let expected = ApiKey::new(Some("secret".to_string()));
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));

        assert!(require_api_key(&headers, &expected).is_ok());
    }

    #[test]
    fn require_api_key_rejects_missing_or_invalid_header() {
        let expected = ApiKey::new(Some("secret".to_string()));

        let missing = require_api_key(&HeaderMap::new(), &expected);
        assert!(matches!(missing, Err(ApiError::Unauthorized)));

        let mut invalid_headers = HeaderMap::new();
        invalid_headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        let invalid = require_api_key(&invalid_headers, &expected);
        assert!(matches!(invalid, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn require_api_key_rejects_non_utf8_header_value() {
        let expected = ApiKey::new(Some("secret".to_string()));
        let mut headers = HeaderMap::new();
        let non_utf8 = HeaderValue::from_bytes(&[0xFF, 0xFE, 0xFD])
            .expect("header value bytes should be accepted");
        headers.insert(API_KEY_HEADER, non_utf8);

        assert!(matches!(
            require_api_key(&headers, &expected),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn unset_or_blank_key_disables_the_check() {
        assert!(require_api_key(&HeaderMap::new(), &ApiKey::default()).is_ok());

        let blank = ApiKey::new(Some("  ".to_string()));
        assert!(!blank.is_enabled());
        assert!(require_api_key(&HeaderMap::new(), &blank).is_ok());
    }
}
