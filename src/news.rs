use regex::Regex;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::NewsConfig;

const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct Article {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct HeadlineListing {
    status: String,
    #[serde(rename = "totalResults")]
    total_results: Option<u64>,
    #[serde(default)]
    articles: Vec<ListedArticle>,
}

#[derive(Debug, Deserialize)]
struct ListedArticle {
    title: Option<String>,
    url: Option<String>,
}

/// Top headlines for the configured country, each paired with whatever
/// body text could be scraped from the linked page.
pub async fn fetch_top_articles(
    client: &reqwest::Client,
    cfg: &NewsConfig,
    api_key: &str,
) -> anyhow::Result<Vec<Article>> {
    let res = client
        .get(&cfg.endpoint)
        .query(&[
            ("country", cfg.country.as_str()),
            ("pageSize", &cfg.page_size.to_string()),
            ("apiKey", api_key),
        ])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let listing: HeadlineListing = serde_json::from_str(&res)?;
    if listing.status != "ok" || listing.total_results.unwrap_or(0) == 0 {
        warn!(
            "headline listing returned no results (status {})",
            listing.status
        );
        return Ok(Vec::new());
    }

    let mut articles = Vec::new();
    for listed in listing.articles {
        let title = listed.title.unwrap_or_default();
        let body = match &listed.url {
            Some(url) => match fetch_article_body(client, url, cfg.min_paragraph_chars).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("article body fetch failed for {}: {}", url, e);
                    format!("[Error fetching article body: {}]", e)
                }
            },
            None => "[Error fetching article body: listing entry has no url]".to_string(),
        };
        debug!("fetched article: {}", title);
        articles.push(Article { title, body });
    }
    info!("fetched {} articles", articles.len());
    Ok(articles)
}

async fn fetch_article_body(
    client: &reqwest::Client,
    url: &str,
    min_paragraph_chars: usize,
) -> anyhow::Result<String> {
    let html = client
        .get(url)
        .header(USER_AGENT, BROWSER_UA)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(extract_paragraphs(&html, min_paragraph_chars))
}

/// Pulls the text of every <p> element longer than `min_chars` and joins
/// them with single spaces. Markup inside the paragraphs is dropped.
pub fn extract_paragraphs(html: &str, min_chars: usize) -> String {
    let para = Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap();
    let tag = Regex::new(r"(?s)<[^>]+>").unwrap();
    let ws = Regex::new(r"\s+").unwrap();

    let mut kept = Vec::new();
    for cap in para.captures_iter(html) {
        let inner = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        let text = tag.replace_all(inner, " ");
        let text = decode_entities(&text);
        let text = ws.replace_all(text.trim(), " ").into_owned();
        if text.len() > min_chars {
            kept.push(text);
        }
    }
    kept.join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_extraction_keeps_long_paragraphs_in_order() {
        let html = "<html><body>\
            <p>Short one.</p>\
            <p class=\"lead\">The first substantial paragraph of the article body, long enough to keep.</p>\
            <div><p>Another substantial paragraph that also clears the length threshold easily here.</p></div>\
            </body></html>";
        let out = extract_paragraphs(html, 50);
        assert_eq!(
            out,
            "The first substantial paragraph of the article body, long enough to keep. \
             Another substantial paragraph that also clears the length threshold easily here."
        );
    }

    #[test]
    fn paragraph_extraction_strips_nested_markup_and_entities() {
        let html = "<p>Prices rose by <b>ten&nbsp;percent</b> &amp; analysts say the rally is far from finished.</p>";
        let out = extract_paragraphs(html, 50);
        assert_eq!(
            out,
            "Prices rose by ten percent & analysts say the rally is far from finished."
        );
    }

    #[test]
    fn no_qualifying_paragraphs_yields_empty_body() {
        let out = extract_paragraphs("<p>tiny</p><p>also tiny</p>", 50);
        assert_eq!(out, "");
    }

    #[test]
    fn listing_with_not_ok_status_deserializes_without_articles() {
        let raw = r#"{"status":"error","code":"apiKeyInvalid","message":"bad key"}"#;
        let listing: HeadlineListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.status, "error");
        assert!(listing.articles.is_empty());
        assert_eq!(listing.total_results, None);
    }

    #[test]
    fn listing_deserializes_articles_with_optional_fields() {
        let raw = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {"title": "Gas prices hit record", "url": "https://example.com/gas"},
                {"title": null, "url": null}
            ]
        }"#;
        let listing: HeadlineListing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.total_results, Some(2));
        assert_eq!(listing.articles.len(), 2);
        assert_eq!(
            listing.articles[0].title.as_deref(),
            Some("Gas prices hit record")
        );
        assert!(listing.articles[1].title.is_none());
    }
}
