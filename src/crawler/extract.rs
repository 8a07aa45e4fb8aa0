use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements and the attribute carrying their URL
const URL_ATTRIBUTES: [(&str, &str); 4] = [
    ("a[href]", "href"),
    ("img[src]", "src"),
    ("link[href]", "href"),
    ("script[src]", "src"),
];

static SELECTORS: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    URL_ATTRIBUTES
        .iter()
        .map(|(css, attr)| (Selector::parse(css).expect("static selector"), *attr))
        .collect()
});

/// Collect links on `page_url`'s host from an HTML document.
///
/// Relative references are resolved against the page URL and fragments are
/// dropped. Only http(s) URLs on the same host are kept, each once, in
/// document order per element kind (anchors, images, stylesheets, scripts).
/// References that do not parse are skipped.
pub fn extract_urls(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Some(host) = page_url.host_str() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for (selector, attr) in SELECTORS.iter() {
        for element in document.select(selector) {
            let Some(reference) = element.value().attr(attr) else {
                continue;
            };
            let Some(url) = resolve(page_url, reference) else {
                continue;
            };

            if url.host_str() == Some(host) && seen.insert(url.to_string()) {
                urls.push(url);
            }
        }
    }

    urls
}

fn resolve(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let mut url = base.join(reference).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
