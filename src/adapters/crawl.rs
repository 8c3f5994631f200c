use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use super::EndpointCrawler;
use crate::error::StageError;

/// Fetches the root page of a hostname and pulls every `a[href]` and
/// `script[src]` target out of the rendered document, resolved against the
/// final response URL (redirects included).
pub struct PageCrawler {
    client: Client,
}

impl PageCrawler {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

#[async_trait::async_trait]
impl EndpointCrawler for PageCrawler {
    async fn crawl(&self, hostname: &str) -> Result<Vec<String>, StageError> {
        let root = format!("https://{}", hostname);
        let resp = self.client.get(&root).send().await.map_err(|e| StageError::Crawl {
            host: hostname.to_string(),
            reason: e.to_string(),
        })?;

        // Relative references resolve against wherever we actually landed.
        let base = resp.url().clone();
        let body = resp.text().await.map_err(|e| StageError::Crawl {
            host: hostname.to_string(),
            reason: e.to_string(),
        })?;

        Ok(extract_links(&body, &base))
    }
}

/// Deduplicated absolute URLs from hyperlink and script-source attributes.
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");
    let scripts = Selector::parse("script[src]").expect("static selector");

    let mut urls = BTreeSet::new();
    for el in doc.select(&anchors) {
        if let Some(href) = el.value().attr("href") {
            if let Ok(abs) = base.join(href) {
                urls.insert(abs.to_string());
            }
        }
    }
    for el in doc.select(&scripts) {
        if let Some(src) = el.value().attr("src") {
            if let Ok(abs) = base.join(src) {
                urls.insert(abs.to_string());
            }
        }
    }

    urls.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute_links() {
        let base = Url::parse("https://app.example.com/index.html").unwrap();
        let html = r#"
            <html><body>
                <a href="/login">Login</a>
                <a href="https://cdn.example.com/lib.js">lib</a>
                <script src="assets/main.js"></script>
            </body></html>
        "#;
        let links = extract_links(html, &base);
        assert!(links.contains(&"https://app.example.com/login".to_string()));
        assert!(links.contains(&"https://cdn.example.com/lib.js".to_string()));
        assert!(links.contains(&"https://app.example.com/assets/main.js".to_string()));
    }

    #[test]
    fn deduplicates_repeated_targets() {
        let base = Url::parse("https://app.example.com/").unwrap();
        let html = r#"<a href="/x">one</a><a href="/x">two</a>"#;
        let links = extract_links(html, &base);
        assert_eq!(links, vec!["https://app.example.com/x".to_string()]);
    }

    #[test]
    fn ignores_elements_without_targets() {
        let base = Url::parse("https://app.example.com/").unwrap();
        let html = r#"<a name="anchor">no href</a><script>inline()</script>"#;
        assert!(extract_links(html, &base).is_empty());
    }
}
