//! Cybersecurity news from RSS feeds.

use std::{collections::HashSet, fmt, str::FromStr};

use serde::Deserialize;

use crate::{
    formatting::{escape_html, strip_tags, truncate_text},
    Error, Result,
};

const SUMMARY_MAX_CHARS: usize = 200;

/// Items taken from each source for the combined `/news` digest.
pub const DIGEST_PER_SOURCE: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    HackerNews,
    ZeroClickZero,
    SecurityWeek,
}

impl FeedSource {
    pub fn url(self) -> &'static str {
        match self {
            FeedSource::HackerNews => "https://hnrss.org/frontpage",
            FeedSource::ZeroClickZero => "https://feeds.feedburner.com/TheHackersNews",
            FeedSource::SecurityWeek => "https://feeds.feedburner.com/securityweek",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FeedSource::HackerNews => "HackerNews",
            FeedSource::ZeroClickZero => "ZeroClickZero",
            FeedSource::SecurityWeek => "SecurityWeek",
        }
    }

    /// Max entries kept per fetch.
    pub fn limit(self) -> usize {
        match self {
            FeedSource::SecurityWeek => 5,
            FeedSource::HackerNews | FeedSource::ZeroClickZero => 10,
        }
    }

    fn with_summary(self) -> bool {
        matches!(self, FeedSource::ZeroClickZero)
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FeedSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hackernews" => Ok(FeedSource::HackerNews),
            "zeroclickzero" | "zeroclick" => Ok(FeedSource::ZeroClickZero),
            "securityweek" => Ok(FeedSource::SecurityWeek),
            other => Err(Error::Config(format!("unknown feed source: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub summary: Option<String>,
    pub source: FeedSource,
}

/// Parse an RSS 2.0 document into at most `source.limit()` items.
pub fn parse_feed(source: FeedSource, body: &[u8]) -> Result<Vec<NewsItem>> {
    let channel = rss::Channel::read_from(body).map_err(|e| Error::Feed {
        source_name: source.label().to_string(),
        reason: e.to_string(),
    })?;

    let items = channel
        .items()
        .iter()
        .take(source.limit())
        .map(|entry| NewsItem {
            title: entry.title().unwrap_or_default().trim().to_string(),
            link: entry.link().unwrap_or_default().trim().to_string(),
            published: entry.pub_date().map(str::to_string),
            summary: if source.with_summary() {
                entry
                    .description()
                    .map(|d| truncate_text(&strip_tags(d), SUMMARY_MAX_CHARS))
            } else {
                None
            },
            source,
        })
        .collect();

    Ok(items)
}

/// Concatenate per-source item lists, dropping repeated links.
pub fn merge_digest(lists: Vec<Vec<NewsItem>>, per_source: usize) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flat_map(|items| items.into_iter().take(per_source))
        .filter(|item| item.link.is_empty() || seen.insert(item.link.clone()))
        .collect()
}

/// Render items as a Telegram HTML message. Only the first `max_items` are
/// shown; the footer reports the full count.
pub fn format_news_message(items: &[NewsItem], label: &str, max_items: usize) -> String {
    if items.is_empty() {
        return "No se encontraron noticias recientes.".to_string();
    }

    let mut out = format!("📰 <b>Últimas noticias de {}</b>\n\n", escape_html(label));

    for (i, item) in items.iter().take(max_items).enumerate() {
        out.push_str(&format!("{}. <b>{}</b>\n", i + 1, escape_html(&item.title)));
        if let Some(summary) = item.summary.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("   {}\n", escape_html(summary)));
        }
        out.push_str(&format!(
            "   🔗 <a href=\"{}\">Leer más</a>\n\n",
            escape_html(&item.link)
        ));
    }

    out.push_str(&format!("\n📊 Total: {} noticias", items.len()));
    out
}

/// Fetches feeds over HTTP.
#[derive(Clone, Debug)]
pub struct NewsFetcher {
    http: reqwest::Client,
}

impl NewsFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn try_fetch(&self, source: FeedSource) -> Result<Vec<NewsItem>> {
        let resp = self.http.get(source.url()).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Feed {
                source_name: source.label().to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }
        let body = resp.bytes().await?;
        parse_feed(source, &body)
    }

    /// Latest items of `source`. Any failure is logged and yields no items.
    pub async fn fetch(&self, source: FeedSource) -> Vec<NewsItem> {
        match self.try_fetch(source).await {
            Ok(items) => {
                tracing::debug!(source = %source, count = items.len(), "fetched feed");
                items
            }
            Err(e) => {
                tracing::error!(source = %source, "error fetching feed: {e}");
                Vec::new()
            }
        }
    }

    /// Combined digest: HackerNews then ZeroClickZero, `DIGEST_PER_SOURCE` each.
    pub async fn fetch_digest(&self) -> Vec<NewsItem> {
        let (hn, zcz) = tokio::join!(
            self.fetch(FeedSource::HackerNews),
            self.fetch(FeedSource::ZeroClickZero)
        );
        merge_digest(vec![hn, zcz], DIGEST_PER_SOURCE)
    }
}
