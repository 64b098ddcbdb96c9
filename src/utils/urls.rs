use url::Url;

use crate::errors::FetchError;

/// Whether `path` starts with a URL scheme (`scheme://`).
#[must_use]
pub fn is_absolute_url(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolves a request path against the configured base URL.
///
/// Absolute URLs bypass the base entirely. Relative paths are appended to the
/// base, keeping its path prefix and joining with exactly one `/`.
///
/// # Errors
///
/// Returns `FetchError::Config` when the result is not a valid URL or a
/// relative path is used without a base URL.
pub fn resolve_url(
    base: Option<&Url>,
    path: &str,
    query: &[(String, String)],
) -> Result<Url, FetchError> {
    let mut url = if is_absolute_url(path) {
        Url::parse(path).map_err(|e| FetchError::Config(format!("invalid URL `{path}`: {e}")))?
    } else {
        let base = base.ok_or_else(|| {
            FetchError::Config(format!(
                "relative path `{path}` requires a configured base URL"
            ))
        })?;
        let joined = match path.trim_start_matches('/') {
            "" => base.as_str().to_string(),
            rest => format!("{}/{}", base.as_str().trim_end_matches('/'), rest),
        };
        Url::parse(&joined)
            .map_err(|e| FetchError::Config(format!("invalid URL `{joined}`: {e}")))?
    };

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://project.supabase.co/rest/v1").unwrap()
    }

    #[test]
    fn test_is_absolute_url() {
        assert!(is_absolute_url("https://example.com"));
        assert!(is_absolute_url("http://localhost:54321/functions/v1"));
        assert!(is_absolute_url("git+ssh://host/repo"));
        assert!(!is_absolute_url("/memos"));
        assert!(!is_absolute_url("memos?redirect=https://example.com"));
        assert!(!is_absolute_url("1http://example.com"));
    }

    #[test]
    fn test_relative_path_is_appended_to_base() {
        let url = resolve_url(Some(&base()), "/memos", &[]).unwrap();
        assert_eq!(url.as_str(), "https://project.supabase.co/rest/v1/memos");

        let url = resolve_url(Some(&base()), "memos/1", &[]).unwrap();
        assert_eq!(url.as_str(), "https://project.supabase.co/rest/v1/memos/1");
    }

    #[test]
    fn test_trailing_slash_on_base_is_not_doubled() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let url = resolve_url(Some(&base), "/tags", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/tags");
    }

    #[test]
    fn test_absolute_url_bypasses_base() {
        let url = resolve_url(Some(&base()), "https://cdn.example.com/a.png", &[]).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_query_pairs_are_encoded() {
        let query = vec![
            ("select".to_string(), "*".to_string()),
            ("title".to_string(), "eq.hello world".to_string()),
        ];
        let url = resolve_url(Some(&base()), "memos", &query).unwrap();
        assert_eq!(url.query(), Some("select=*&title=eq.hello+world"));
    }

    #[test]
    fn test_relative_path_without_base_is_config_error() {
        let err = resolve_url(None, "/memos", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }
}
