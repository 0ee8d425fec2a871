use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Structural SEO signals derived from one fetched document.
///
/// Derived data only. Signals are recomputed on every analysis pass and
/// never cached, so this struct carries no identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoSignals {
    /// A title element with non-empty text content exists
    pub has_title: bool,

    /// A meta description with non-whitespace content exists
    pub has_meta_description: bool,

    /// At least one h1 element is present
    pub has_h1: bool,

    /// Number of h1 elements on the page
    pub h1_count: usize,

    /// No robots meta directive forbids indexing
    pub indexable: bool,

    /// The canonical link, if declared, points at the fetched URL itself
    pub canonical_ok: bool,

    /// Resolved canonical URL, when one is declared and resolvable
    pub canonical_url: Option<String>,

    /// Deduplicated @type values from JSON-LD blocks, in first-seen order
    pub schema_types: Vec<String>,

    /// Aggregate structural score in [0, 100]
    pub structural_score: i32,
}

/// Derive SEO signals from an HTML document.
///
/// Pure function over its inputs. Malformed markup never raises; any
/// ambiguity resolves to the conservative "signal absent" value. `final_url`
/// is the post-redirect URL the document was actually fetched from and is
/// the base for canonical resolution.
pub fn extract(html: &str, final_url: &str) -> SeoSignals {
    let document = Html::parse_document(html);

    let has_title = document
        .select(&selector("title"))
        .next()
        .map(|el| !el.text().collect::<String>().trim().is_empty())
        .unwrap_or(false);

    let has_meta_description = meta_content(&document, "description")
        .map(|content| !content.trim().is_empty())
        .unwrap_or(false);

    let h1_count = document.select(&selector("h1")).count();
    let has_h1 = h1_count > 0;

    let indexable = meta_content(&document, "robots")
        .map(|content| !content.to_ascii_lowercase().contains("noindex"))
        .unwrap_or(true);

    let (canonical_ok, canonical_url) = resolve_canonical(&document, final_url);

    let schema_types = collect_schema_types(&document);

    let mut score: i32 = 100;
    if !has_title {
        score -= 25;
    }
    if !has_meta_description {
        score -= 15;
    }
    if !has_h1 {
        score -= 15;
    }
    if !indexable {
        score -= 30;
    }
    if !canonical_ok {
        score -= 15;
    }

    SeoSignals {
        has_title,
        has_meta_description,
        has_h1,
        h1_count,
        indexable,
        canonical_ok,
        canonical_url,
        structural_score: score.clamp(0, 100),
        schema_types,
    }
}

// Selectors are static patterns; parsing them cannot fail at runtime.
fn selector(pattern: &str) -> Selector {
    Selector::parse(pattern).unwrap()
}

/// Content attribute of the first meta element with the given name.
/// Name matching is ASCII case-insensitive, as browsers treat it.
fn meta_content(document: &Html, name: &str) -> Option<String> {
    document
        .select(&selector("meta"))
        .find(|el| {
            el.value()
                .attr("name")
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.to_string())
}

/// Resolve the declared canonical link against the fetched URL.
///
/// Absent canonical is fine (`true`, no URL). A declared canonical must
/// resolve to exactly the fetched URL; a missing or malformed href, or an
/// unresolvable base, counts against the page.
fn resolve_canonical(document: &Html, final_url: &str) -> (bool, Option<String>) {
    let link = match document.select(&selector(r#"link[rel="canonical"]"#)).next() {
        Some(link) => link,
        None => return (true, None),
    };

    let href = match link.value().attr("href") {
        Some(href) => href,
        None => return (false, None),
    };

    let base = match Url::parse(final_url) {
        Ok(base) => base,
        Err(_) => return (false, None),
    };

    match base.join(href) {
        Ok(resolved) => {
            let resolved = resolved.to_string();
            let ok = resolved == final_url;
            (ok, Some(resolved))
        }
        Err(_) => (false, None),
    }
}

/// Collect @type values from every JSON-LD script block.
///
/// Blocks that fail to parse are skipped without surfacing an error; a
/// broken vendor snippet should not void the types declared elsewhere on
/// the page.
fn collect_schema_types(document: &Html) -> Vec<String> {
    let mut types = Vec::new();

    for script in document.select(&selector(r#"script[type="application/ld+json"]"#)) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(&raw) {
            collect_types(&value, &mut types);
        }
    }

    types
}

fn collect_types(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(declared) = map.get("@type") {
                match declared {
                    Value::String(s) => push_unique(out, s),
                    Value::Array(items) => {
                        for item in items {
                            if let Value::String(s) = item {
                                push_unique(out, s);
                            }
                        }
                    }
                    _ => {}
                }
            }
            for nested in map.values() {
                collect_types(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_types(item, out);
            }
        }
        _ => {}
    }
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|existing| existing == value) {
        out.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/page";

    fn page(body: &str) -> String {
        format!("<html><head>{body}</head><body></body></html>")
    }

    #[test]
    fn full_page_scores_100() {
        let html = format!(
            "<html><head>\
             <title>Welcome</title>\
             <meta name=\"description\" content=\"A fine page\">\
             <link rel=\"canonical\" href=\"{URL}\">\
             </head><body><h1>Welcome</h1></body></html>"
        );
        let signals = extract(&html, URL);

        assert!(signals.has_title);
        assert!(signals.has_meta_description);
        assert!(signals.has_h1);
        assert_eq!(signals.h1_count, 1);
        assert!(signals.indexable);
        assert!(signals.canonical_ok);
        assert_eq!(signals.structural_score, 100);
    }

    #[test]
    fn empty_document_loses_content_penalties_only() {
        let signals = extract("", URL);

        assert!(!signals.has_title);
        assert!(!signals.has_meta_description);
        assert!(!signals.has_h1);
        assert!(signals.indexable);
        assert!(signals.canonical_ok);
        // 100 - 25 - 15 - 15
        assert_eq!(signals.structural_score, 45);
    }

    #[test]
    fn page_failing_everything_scores_zero_not_negative() {
        let html = page(
            "<meta name=\"robots\" content=\"noindex\">\
             <link rel=\"canonical\" href=\"https://elsewhere.example/other\">",
        );
        let signals = extract(&html, URL);

        assert!(!signals.indexable);
        assert!(!signals.canonical_ok);
        assert_eq!(signals.structural_score, 0);
    }

    #[test]
    fn penalties_are_independent_and_additive() {
        for mask in 0u8..32 {
            let title = mask & 1 != 0;
            let meta = mask & 2 != 0;
            let h1 = mask & 4 != 0;
            let indexable = mask & 8 != 0;
            let canonical = mask & 16 != 0;

            let mut head = String::new();
            if title {
                head.push_str("<title>T</title>");
            }
            if meta {
                head.push_str("<meta name=\"description\" content=\"d\">");
            }
            if !indexable {
                head.push_str("<meta name=\"robots\" content=\"noindex\">");
            }
            if canonical {
                head.push_str(&format!("<link rel=\"canonical\" href=\"{URL}\">"));
            } else {
                head.push_str("<link rel=\"canonical\" href=\"https://other.example/\">");
            }
            let body = if h1 { "<h1>H</h1>" } else { "" };
            let html = format!("<html><head>{head}</head><body>{body}</body></html>");

            let expected = (100
                - if title { 0 } else { 25 }
                - if meta { 0 } else { 15 }
                - if h1 { 0 } else { 15 }
                - if indexable { 0 } else { 30 }
                - if canonical { 0 } else { 15 })
            .max(0);

            let signals = extract(&html, URL);
            assert_eq!(
                signals.structural_score, expected,
                "wrong score for combination {mask:05b}"
            );
        }
    }

    #[test]
    fn whitespace_title_does_not_count() {
        let signals = extract(&page("<title>   </title>"), URL);
        assert!(!signals.has_title);
    }

    #[test]
    fn meta_name_matching_is_case_insensitive() {
        let signals = extract(
            &page("<meta name=\"Description\" content=\"hello\">"),
            URL,
        );
        assert!(signals.has_meta_description);
    }

    #[test]
    fn whitespace_meta_content_does_not_count() {
        let signals = extract(
            &page("<meta name=\"description\" content=\"   \">"),
            URL,
        );
        assert!(!signals.has_meta_description);
    }

    #[test]
    fn h1_count_is_surfaced() {
        let html = "<html><body><h1>a</h1><h1>b</h1><h1>c</h1></body></html>";
        let signals = extract(html, URL);
        assert!(signals.has_h1);
        assert_eq!(signals.h1_count, 3);
    }

    #[test]
    fn noindex_is_a_case_insensitive_substring() {
        for content in ["noindex", "NOINDEX", "noindex, nofollow", "nofollow,NoIndex"] {
            let html = page(&format!("<meta name=\"robots\" content=\"{content}\">"));
            assert!(!extract(&html, URL).indexable, "content {content:?}");
        }

        let html = page("<meta name=\"robots\" content=\"nofollow\">");
        assert!(extract(&html, URL).indexable);
    }

    #[test]
    fn relative_canonical_resolves_against_final_url() {
        let signals = extract(&page("<link rel=\"canonical\" href=\"/page\">"), URL);
        assert!(signals.canonical_ok);
        assert_eq!(signals.canonical_url.as_deref(), Some(URL));
    }

    #[test]
    fn canonical_pointing_elsewhere_is_not_ok() {
        let signals = extract(
            &page("<link rel=\"canonical\" href=\"https://example.com/other\">"),
            URL,
        );
        assert!(!signals.canonical_ok);
        assert_eq!(
            signals.canonical_url.as_deref(),
            Some("https://example.com/other")
        );
    }

    #[test]
    fn canonical_comparison_is_exact() {
        // Trailing slash difference is a mismatch under exact equality
        let signals = extract(
            &page("<link rel=\"canonical\" href=\"https://example.com/page/\">"),
            URL,
        );
        assert!(!signals.canonical_ok);
    }

    #[test]
    fn malformed_canonical_href_is_not_ok() {
        let signals = extract(
            &page("<link rel=\"canonical\" href=\"https://exa mple.com/x\">"),
            URL,
        );
        assert!(!signals.canonical_ok);
        assert!(signals.canonical_url.is_none());
    }

    #[test]
    fn canonical_without_href_is_not_ok() {
        let signals = extract(&page("<link rel=\"canonical\">"), URL);
        assert!(!signals.canonical_ok);
    }

    #[test]
    fn schema_types_from_string_and_array() {
        let html = page(
            "<script type=\"application/ld+json\">\
             {\"@type\": \"Organization\"}\
             </script>\
             <script type=\"application/ld+json\">\
             {\"@type\": [\"Product\", \"Thing\"]}\
             </script>",
        );
        let signals = extract(&html, URL);
        assert_eq!(signals.schema_types, vec!["Organization", "Product", "Thing"]);
    }

    #[test]
    fn schema_types_found_inside_graph_nesting() {
        let html = page(
            "<script type=\"application/ld+json\">\
             {\"@graph\": [{\"@type\": \"Article\", \"author\": {\"@type\": \"Person\"}}]}\
             </script>",
        );
        let signals = extract(&html, URL);
        assert_eq!(signals.schema_types, vec!["Article", "Person"]);
    }

    #[test]
    fn invalid_json_ld_blocks_are_skipped() {
        let html = page(
            "<script type=\"application/ld+json\">{not json</script>\
             <script type=\"application/ld+json\">{\"@type\": \"WebSite\"}</script>",
        );
        let signals = extract(&html, URL);
        assert_eq!(signals.schema_types, vec!["WebSite"]);
    }

    #[test]
    fn schema_types_are_deduplicated_in_first_seen_order() {
        let html = page(
            "<script type=\"application/ld+json\">\
             {\"@type\": [\"Product\", \"Product\", \"Offer\"]}\
             </script>\
             <script type=\"application/ld+json\">\
             {\"@type\": \"Product\"}\
             </script>",
        );
        let signals = extract(&html, URL);
        assert_eq!(signals.schema_types, vec!["Product", "Offer"]);
    }

    #[test]
    fn tolerates_malformed_markup() {
        for html in [
            "<html><head><title>open",
            "<<<>>>",
            "<h1><h1><h1",
            "<link rel=canonical href=",
        ] {
            let signals = extract(html, URL);
            assert!(signals.structural_score <= 100);
        }
    }

    #[test]
    fn unparseable_final_url_with_canonical_present() {
        let signals = extract(
            &page("<link rel=\"canonical\" href=\"/page\">"),
            "not a url",
        );
        assert!(!signals.canonical_ok);
    }

    #[test]
    fn missing_title_only_scores_75() {
        let html = "<html><head>\
             <meta name=\"description\" content=\"desc\">\
             </head><body><h1>Heading</h1></body></html>";
        let signals = extract(html, URL);
        assert_eq!(signals.structural_score, 75);
    }
}
