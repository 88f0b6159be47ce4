use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::error::AppError;

/// Parse a header string in format "Name: Value"
pub fn parse_header(header_str: &str) -> Result<(HeaderName, HeaderValue), AppError> {
    let Some((name, value)) = header_str.split_once(':') else {
        return Err(AppError::InvalidInput(format!(
            "invalid header '{header_str}', expected 'Name: Value'"
        )));
    };
    let (name, value) = (name.trim(), value.trim());

    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| AppError::InvalidInput(format!("invalid header name '{name}'")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| AppError::InvalidInput(format!("invalid value for header '{name}'")))?;

    Ok((header_name, header_value))
}

/// Parse a collection of header strings into a HeaderMap; later entries win.
pub fn parse_headers(header_strings: &[String]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    for header_str in header_strings {
        let (name, value) = parse_header(header_str)?;
        debug!("Adding header: {}", name);
        headers.insert(name, value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_colon() {
        let headers = parse_headers(&["Referer: https://example.com:8443/live".to_string()]).unwrap();
        assert_eq!(headers["referer"], "https://example.com:8443/live");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(parse_headers(&["no separator".to_string()]).is_err());
        assert!(parse_headers(&["bad name: x".to_string()]).is_err());
        assert!(parse_headers(&["X-Ok: line\nbreak".to_string()]).is_err());
    }

    #[test]
    fn later_values_replace_earlier_ones() {
        let headers = parse_headers(&["X-A: 1".to_string(), "x-a: 2".to_string()]).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-a"], "2");
    }
}
