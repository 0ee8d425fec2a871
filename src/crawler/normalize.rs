use url::Url;

/// Query parameters that carry tracking state and never change the resource.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid"];

/// Normalize a URL so equivalent forms collide in storage.
///
/// Lowercases the host (the url crate does this on parse), strips the
/// fragment and tracking parameters (`utm_*`, `gclid`, `fbclid`) and trims
/// trailing slashes from non-root paths. Path case is preserved. A string
/// that does not parse as a URL is returned unchanged, which keeps the
/// function idempotent for every input.
pub fn normalize(raw: &str) -> String {
    let mut url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(_) => return raw.to_string(), // Can't normalize, return as is
    };

    // Remove fragments (anchors)
    url.set_fragment(None);

    // Drop tracking parameters, preserving the order of the rest
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    // Trim trailing slashes except for the root path
    let path = url.path().to_string();
    let trimmed = path.trim_end_matches('/');
    if !trimmed.is_empty() && trimmed != path {
        url.set_path(trimmed);
    }

    url.to_string()
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_host_and_preserves_path_case() {
        assert_eq!(
            normalize("https://EXAMPLE.com/Some/Path"),
            "https://example.com/Some/Path"
        );
    }

    #[test]
    fn strips_fragment() {
        assert_eq!(
            normalize("https://example.com/page#section"),
            "https://example.com/page"
        );
    }

    #[test]
    fn strips_tracking_parameters() {
        assert_eq!(
            normalize("https://example.com/p?utm_source=x&utm_medium=y"),
            "https://example.com/p"
        );
        assert_eq!(
            normalize("https://example.com/p?gclid=abc&q=1"),
            "https://example.com/p?q=1"
        );
        assert_eq!(
            normalize("https://example.com/p?fbclid=zzz"),
            "https://example.com/p"
        );
    }

    #[test]
    fn keeps_ordinary_parameters_in_order() {
        assert_eq!(
            normalize("https://example.com/search?b=2&a=1"),
            "https://example.com/search?b=2&a=1"
        );
    }

    #[test]
    fn trims_trailing_slash_except_root() {
        assert_eq!(normalize("https://example.com/page/"), "https://example.com/page");
        assert_eq!(normalize("https://example.com/"), "https://example.com/");
        assert_eq!(normalize("https://example.com"), "https://example.com/");
    }

    #[test]
    fn returns_unparseable_input_unchanged() {
        assert_eq!(normalize("not a url"), "not a url");
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "https://Example.com/Page/?utm_source=x#frag",
            "https://example.com/a//b///",
            "https://example.com/?gclid=1&x=2&utm_campaign=c",
            "https://example.com:443/page",
            "http://example.com:80/",
            "not a url",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn end_to_end_seed_example() {
        assert_eq!(
            normalize("https://Example.com/Page/?utm_source=x#frag"),
            "https://example.com/Page"
        );
    }
}
