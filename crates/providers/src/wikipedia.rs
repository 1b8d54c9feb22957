use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use wayfarer_agent::ports::{Encyclopedia, EncyclopediaPage};
use wayfarer_core::cache::cache_key;
use wayfarer_core::config::CacheConfig;
use wayfarer_core::{EvidenceError, ExpiringCache};

use crate::http::fetch_json;

const THUMBNAIL_PX: &str = "1200";

/// MediaWiki search plus intro extract and page image. Needs no key; the
/// shared client carries the user agent Wikimedia asks for. Pages are kept
/// for the configured default TTL.
pub struct WikipediaClient {
    client: Client,
    api_url: String,
    timeout_secs: u64,
    pages: ExpiringCache<EncyclopediaPage>,
}

impl WikipediaClient {
    pub fn new(client: Client, lang: &str, timeout_secs: u64, cache: &CacheConfig) -> Self {
        let lang = lang.trim();
        let lang = if lang.is_empty() { "en" } else { lang };
        Self {
            client,
            api_url: format!("https://{lang}.wikipedia.org/w/api.php"),
            timeout_secs,
            pages: ExpiringCache::from_config(cache),
        }
    }

    async fn search_title(&self, query: &str) -> Result<Option<String>, EvidenceError> {
        let request = self.client.get(&self.api_url).query(&[
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("srlimit", "1"),
            ("format", "json"),
        ]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;
        Ok(first_title(&body))
    }

    async fn intro(&self, title: &str, sentences: u8) -> Result<EncyclopediaPage, EvidenceError> {
        let sentences = sentences.max(1).to_string();
        let request = self.client.get(&self.api_url).query(&[
            ("action", "query"),
            ("prop", "extracts|pageimages"),
            ("explaintext", "1"),
            ("exintro", "1"),
            ("exsentences", sentences.as_str()),
            ("piprop", "thumbnail"),
            ("pithumbsize", THUMBNAIL_PX),
            ("titles", title),
            ("format", "json"),
            ("formatversion", "2"),
        ]);
        let body: Value = fetch_json(request, self.timeout_secs).await?;
        Ok(parse_intro(&body, title))
    }
}

#[async_trait]
impl Encyclopedia for WikipediaClient {
    async fn lookup(&self, query: &str, sentences: u8) -> Result<EncyclopediaPage, EvidenceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EvidenceError::NotFound(String::new()));
        }
        let key = cache_key("wiki", &format!("{sentences}:{query}"));
        if let Some(hit) = self.pages.get(&key) {
            return Ok(hit);
        }
        let title = self
            .search_title(query)
            .await?
            .ok_or_else(|| EvidenceError::NotFound(query.to_owned()))?;
        let page = self.intro(&title, sentences).await?;
        self.pages.set(key, page.clone(), None);
        Ok(page)
    }
}

fn first_title(body: &Value) -> Option<String> {
    body["query"]["search"].get(0)?["title"].as_str().map(str::to_owned)
}

fn parse_intro(body: &Value, title: &str) -> EncyclopediaPage {
    let Some(page) = body["query"]["pages"].get(0) else {
        return EncyclopediaPage { title: title.to_owned(), ..EncyclopediaPage::default() };
    };
    EncyclopediaPage {
        title: page["title"].as_str().unwrap_or(title).to_owned(),
        extract: page["extract"].as_str().unwrap_or_default().trim().to_owned(),
        thumbnail_url: page["thumbnail"]["source"].as_str().map(str::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use wayfarer_agent::ports::{Encyclopedia, EncyclopediaPage};
    use wayfarer_core::cache::cache_key;
    use wayfarer_core::config::CacheConfig;

    use super::{first_title, parse_intro, WikipediaClient};

    fn client(lang: &str) -> WikipediaClient {
        let cache = CacheConfig { default_ttl_secs: 900, max_entries: 8 };
        WikipediaClient::new(reqwest::Client::new(), lang, 5, &cache)
    }

    #[test]
    fn search_hit_title_is_taken() {
        let body = json!({"query": {"search": [{"title": "Fushimi Inari-taisha", "pageid": 1}]}});
        assert_eq!(first_title(&body).as_deref(), Some("Fushimi Inari-taisha"));
        assert_eq!(first_title(&json!({"query": {"search": []}})), None);
    }

    #[test]
    fn intro_reads_extract_and_thumbnail() {
        let body = json!({"query": {"pages": [{
            "title": "Kyoto",
            "extract": " Kyoto is a city in Japan. ",
            "thumbnail": {"source": "https://upload.example/kyoto.jpg", "width": 1200}
        }]}});
        let page = parse_intro(&body, "kyoto");
        assert_eq!(page.title, "Kyoto");
        assert_eq!(page.extract, "Kyoto is a city in Japan.");
        assert_eq!(page.thumbnail_url.as_deref(), Some("https://upload.example/kyoto.jpg"));
    }

    #[test]
    fn missing_page_keeps_the_requested_title() {
        let page = parse_intro(&json!({"batchcomplete": true}), "Nowhere");
        assert_eq!(page.title, "Nowhere");
        assert!(page.extract.is_empty());
        assert_eq!(page.thumbnail_url, None);
    }

    #[test]
    fn blank_language_defaults_to_english() {
        assert_eq!(client(" ").api_url, "https://en.wikipedia.org/w/api.php");
    }

    #[tokio::test]
    async fn cached_page_is_served_without_a_request() {
        let client = client("invalid.example");
        assert_eq!(client.pages.default_ttl(), Duration::from_secs(900));
        let page = EncyclopediaPage {
            title: "Kyoto".into(),
            extract: "Old capital.".into(),
            thumbnail_url: None,
        };
        client.pages.set(cache_key("wiki", "2:Kyoto"), page.clone(), None);

        assert_eq!(client.lookup(" Kyoto ", 2).await.expect("cached"), page);
    }
}
