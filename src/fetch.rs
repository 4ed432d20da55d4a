use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use tracing::{debug, info};

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Title candidates, most specific first.
static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"(?s)<span[^>]*id="productTitle"[^>]*>(.*?)</span>"#,
        r#"<meta[^>]*property="og:title"[^>]*content="([^"]*)""#,
        r#"(?s)<title[^>]*>(.*?)</title>"#,
    ])
});

static IMAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"data-old-hires="(https?://[^"]+)""#,
        r#"<img[^>]*id="landingImage"[^>]*src="(https?://[^"]+)""#,
        r#"<meta[^>]*property="og:image"[^>]*content="(https?://[^"]+)""#,
    ])
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("extraction pattern compiles"))
        .collect()
}

/// Fields pulled from an item page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub name: String,
    pub image_url: String,
}

pub trait ItemFetcher {
    fn fetch(&self, url: &str) -> Result<ItemDetails>;
}

/// Fetches the item page over HTTP and scrapes title and main image.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher { client })
    }
}

impl ItemFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<ItemDetails> {
        info!("Fetching {}", url);
        let html = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .text()
            .with_context(|| format!("Failed to read body of {}", url))?;
        debug!("Fetched {} bytes from {}", html.len(), url);
        extract_details(&html)
    }
}

/// Pull the display name and image URL out of item-page markup.
pub fn extract_details(html: &str) -> Result<ItemDetails> {
    let name = first_match(&TITLE_PATTERNS, html)
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("No product title found in page"))?;
    let image_url = first_match(&IMAGE_PATTERNS, html)
        .map(|u| decode_entities(&u))
        .ok_or_else(|| anyhow!("No product image found in page"))?;
    Ok(ItemDetails { name, image_url })
}

fn first_match(patterns: &[Regex], html: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.trim().is_empty())
    })
}

fn clean_text(raw: &str) -> String {
    let decoded = decode_entities(raw);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
