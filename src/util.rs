//! Utility functions

/// Charset parameter of a media type
///
/// Returns `None` when the value is not a valid media type or declares no
/// charset.
pub fn media_type_charset(content_type: &str) -> Option<String> {
    let media_type: mime::Mime = content_type.trim().parse().ok()?;
    media_type
        .get_param(mime::CHARSET)
        .map(|charset| charset.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_charset() {
        assert_eq!(
            media_type_charset("text/plain; charset=iso-8859-1"),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(
            media_type_charset("application/json;charset=utf-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(media_type_charset("application/json"), None);
        assert_eq!(media_type_charset("not a media type"), None);
    }
}
