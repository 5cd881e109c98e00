// src/capabilities/scraper.rs
//! Headline scraper: one bounded GET, then pull the text out of headline
//! elements (`h2`, `.post-card__title`, `.article-card__title`).

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use ::scraper::{Html, Selector};

use super::{retry_after_from_headers, ScrapeCapability};
use crate::error::{CapResult, CapabilityError};
use crate::parse::normalize_headline;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static HEADLINE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h2, .post-card__title, .article-card__title").expect("headline selector")
});

pub struct HttpScraper {
    http: Client,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(BROWSER_UA)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("building scraper http client")?;
        Ok(Self { http })
    }
}

/// Headline texts in document order, normalised, blanks and repeats dropped.
/// Text is the element's full text content, nested markup included.
pub fn extract_headlines(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut out: Vec<String> = Vec::new();
    for el in doc.select(&HEADLINE_SELECTOR) {
        let text = normalize_headline(&el.text().collect::<String>());
        if !text.is_empty() && !out.contains(&text) {
            out.push(text);
        }
    }
    out
}

#[async_trait]
impl ScrapeCapability for HttpScraper {
    async fn scrape(&self, url: &str) -> CapResult<Vec<String>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("scrape {url}: request failed"))?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after_from_headers(resp.headers(), chrono::Utc::now().timestamp());
            return Err(CapabilityError::rate_limited(wait));
        }
        if !status.is_success() {
            return Err(anyhow!("scrape {url}: HTTP {status}").into());
        }
        let html = resp
            .text()
            .await
            .with_context(|| format!("scrape {url}: reading body"))?;

        let headlines = extract_headlines(&html);
        if headlines.is_empty() {
            return Err(CapabilityError::malformed(format!(
                "scrape {url}: no headline elements found"
            )));
        }
        Ok(headlines)
    }

    fn name(&self) -> &'static str {
        "http-scraper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_h2_and_card_titles_in_order() {
        let html = r#"
            <html><body>
              <h2 class="section">Bitcoin &amp; Ether <em>rally</em></h2>
              <div class="x"><span class="post-card__title">  DAO   vote passes </span></div>
              <a href="/a" class="article-card__title link">AI agents trade on-chain</a>
              <h2>Bitcoin &amp; Ether rally</h2>
              <h2>   </h2>
            </body></html>"#;
        let out = extract_headlines(html);
        assert_eq!(
            out,
            vec![
                "Bitcoin & Ether rally".to_string(),
                "DAO vote passes".to_string(),
                "AI agents trade on-chain".to_string(),
            ]
        );
    }

    #[test]
    fn nested_markup_and_single_quoted_classes_keep_full_text() {
        let html = r#"<div class="post-card__title"><span class="badge">Live</span> Bitcoin breaks $100k</div><a class='article-card__title' href='/x'>Single quoted class headline</a>"#;
        assert_eq!(
            extract_headlines(html),
            vec![
                "Live Bitcoin breaks $100k".to_string(),
                "Single quoted class headline".to_string(),
            ]
        );
    }

    #[test]
    fn page_without_headlines_yields_nothing() {
        assert!(extract_headlines("<p>nothing here</p>").is_empty());
    }
}
