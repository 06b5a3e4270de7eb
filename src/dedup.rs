//! Normalized article identity keys.
//!
//! Titles and URLs arrive from the search provider with inconsistent
//! casing and punctuation. These keys are what dedup matching runs on,
//! so they are computed once at fetch time and stored with the article.

use url::Url;

/// Lowercase a title and keep only ASCII alphanumerics and whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect()
}

/// Lowercase a URL. No structural rewriting.
pub fn normalize_url(url: &str) -> String {
    url.to_lowercase()
}

/// Extract the hostname with a leading `www.` stripped.
/// Returns `unknown` when the URL does not parse or has no host.
pub fn extract_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => "unknown".to_string(),
        },
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_strips_punctuation_and_lowercases() {
        assert_eq!(
            normalize_title("Breaking: Rust 1.99 Released!"),
            "breaking rust 199 released"
        );
    }

    #[test]
    fn title_keeps_digits_and_spaces() {
        assert_eq!(normalize_title("Top 10 Tips"), "top 10 tips");
    }

    #[test]
    fn title_drops_non_ascii_letters() {
        // Accented characters are not in [a-z0-9 ] and are removed.
        assert_eq!(normalize_title("Café Réopens"), "caf ropens");
    }

    #[test]
    fn url_lowercases_only() {
        assert_eq!(
            normalize_url("https://Example.com/Path?Q=1"),
            "https://example.com/path?q=1"
        );
    }

    #[test]
    fn domain_strips_www() {
        assert_eq!(extract_domain("https://www.example.com/a/b"), "example.com");
        assert_eq!(extract_domain("https://news.example.com/a"), "news.example.com");
    }

    #[test]
    fn domain_unknown_on_garbage() {
        assert_eq!(extract_domain("not a url"), "unknown");
        assert_eq!(extract_domain(""), "unknown");
    }
}
