//! Public proxy lists.

use std::{collections::HashSet, sync::OnceLock};

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use regex::Regex;

use crate::{formatting::escape_html, Result};

pub const PROXY_SOURCES: &[&str] = &[
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all",
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks4&timeout=10000&country=all",
    "https://api.proxyscrape.com/v2/?request=getproxies&protocol=socks5&timeout=10000&country=all",
    "https://www.proxy-list.download/api/v1/get?type=http",
    "https://www.proxy-list.download/api/v1/get?type=https",
];

/// Cap on the deduplicated list returned by [`ProxyFetcher::fetch_proxies`].
pub const MAX_PROXIES: usize = 100;

pub const RANDOM_SAMPLE_SIZE: usize = 10;

const BLOCK_SIZE: usize = 10;

/// `true` for `a.b.c.d:port` with 1-3 digit octets and a 1-5 digit port.
pub fn is_valid_proxy(s: &str) -> bool {
    static PROXY_RE: OnceLock<Regex> = OnceLock::new();
    PROXY_RE
        .get_or_init(|| {
            Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}:\d{1,5}$").expect("valid regex")
        })
        .is_match(s)
}

/// Valid `ip:port` lines of a plain-text proxy list.
pub fn parse_proxy_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| is_valid_proxy(line))
        .map(str::to_string)
        .collect()
}

/// Deduplicate across lists (first seen wins) and cap at `max`.
pub fn merge_proxy_lists(lists: impl IntoIterator<Item = Vec<String>>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|p| seen.insert(p.clone()))
        .take(max)
        .collect()
}

/// Random sample of `count` proxies, or all of them when there are fewer.
pub fn pick_random(proxies: &[String], count: usize) -> Vec<String> {
    if proxies.len() <= count {
        return proxies.to_vec();
    }
    let mut rng = rand::thread_rng();
    proxies.choose_multiple(&mut rng, count).cloned().collect()
}

pub fn format_proxies_message(
    proxies: &[String],
    kind: &str,
    max_shown: usize,
    now: DateTime<Local>,
) -> String {
    if proxies.is_empty() {
        return "No se encontraron proxies disponibles en este momento.".to_string();
    }

    let mut out = format!("🔒 <b>Lista de Proxies {}</b>\n", escape_html(kind));
    out.push_str(&format!(
        "📅 Actualizado: {}\n",
        now.format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&format!("📊 Total: {} proxies\n\n", proxies.len()));

    let shown = &proxies[..proxies.len().min(max_shown)];
    for block in shown.chunks(BLOCK_SIZE) {
        out.push_str("<pre>");
        for proxy in block {
            out.push_str(&escape_html(proxy));
            out.push('\n');
        }
        out.push_str("</pre>\n\n");
    }

    out.push_str("⚠️ <b>Nota:</b> Estos proxies son públicos, úsalos con responsabilidad.\n");
    out.push_str("🔧 Para probar: <code>curl --proxy http://IP:PORT http://ifconfig.me</code>");
    out
}

/// Fetches proxy lists over HTTP.
#[derive(Clone, Debug)]
pub struct ProxyFetcher {
    http: reqwest::Client,
    sources: Vec<String>,
}

impl ProxyFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            sources: PROXY_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn fetch_source(&self, url: &str) -> Result<Vec<String>> {
        let body = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_proxy_list(&body))
    }

    /// Query every source; failed sources are logged and skipped.
    ///
    /// Fails only when no source could be read at all.
    pub async fn fetch_proxies(&self) -> Result<Vec<String>> {
        let mut lists = Vec::with_capacity(self.sources.len());
        let mut last_err = None;
        for url in &self.sources {
            match self.fetch_source(url).await {
                Ok(list) => {
                    tracing::debug!(%url, count = list.len(), "fetched proxy list");
                    lists.push(list);
                }
                Err(e) => {
                    tracing::error!(%url, "error fetching proxies: {e}");
                    last_err = Some(e);
                }
            }
        }

        match (lists.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(merge_proxy_lists(lists, MAX_PROXIES)),
        }
    }

    pub async fn random_proxies(&self, count: usize) -> Result<Vec<String>> {
        let all = self.fetch_proxies().await?;
        Ok(pick_random(&all, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Serve `status` and `body` to every connection on a local port.
    async fn serve(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = sock.read(&mut buf).await;
                let resp = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}/list")
    }

    fn fetcher(sources: Vec<String>) -> ProxyFetcher {
        ProxyFetcher {
            http: reqwest::Client::builder().no_proxy().build().unwrap(),
            sources,
        }
    }

    fn proxies(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("10.0.{}.{}:8080", i / 256, i % 256)).collect()
    }

    #[test]
    fn validates_ipv4_port() {
        assert!(is_valid_proxy("1.2.3.4:80"));
        assert!(is_valid_proxy("255.255.255.255:65535"));
        assert!(!is_valid_proxy("1.2.3.4"));
        assert!(!is_valid_proxy("1.2.3:80"));
        assert!(!is_valid_proxy("1.2.3.4:123456"));
        assert!(!is_valid_proxy("1234.2.3.4:80"));
        assert!(!is_valid_proxy("host.example:80"));
        assert!(!is_valid_proxy(" 1.2.3.4:80"));
    }

    #[test]
    fn parses_lists_with_crlf_and_junk() {
        let body = "1.1.1.1:80\r\n\r\n<html>\n 2.2.2.2:3128 \nfoo:bar\n";
        assert_eq!(parse_proxy_list(body), vec!["1.1.1.1:80", "2.2.2.2:3128"]);
    }

    #[test]
    fn merge_dedupes_and_caps() {
        let a = vec!["1.1.1.1:80".to_string(), "2.2.2.2:80".to_string()];
        let b = vec!["2.2.2.2:80".to_string(), "3.3.3.3:80".to_string()];
        assert_eq!(
            merge_proxy_lists(vec![a.clone(), b.clone()], 100),
            vec!["1.1.1.1:80", "2.2.2.2:80", "3.3.3.3:80"]
        );
        assert_eq!(merge_proxy_lists(vec![a, b], 2).len(), 2);
    }

    #[test]
    fn random_pick_is_a_distinct_subset() {
        let all = proxies(30);
        let picked = pick_random(&all, RANDOM_SAMPLE_SIZE);
        assert_eq!(picked.len(), RANDOM_SAMPLE_SIZE);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), RANDOM_SAMPLE_SIZE);
        assert!(picked.iter().all(|p| all.contains(p)));

        assert_eq!(pick_random(&all[..4], RANDOM_SAMPLE_SIZE), all[..4].to_vec());
    }

    #[test]
    fn format_empty() {
        let now = Local.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(
            format_proxies_message(&[], "HTTP", 50, now),
            "No se encontraron proxies disponibles en este momento."
        );
    }

    #[test]
    fn format_blocks_of_ten_capped() {
        let now = Local.with_ymd_and_hms(2026, 1, 2, 9, 5, 0).unwrap();
        let list = proxies(57);
        let msg = format_proxies_message(&list, "HTTP/SOCKS", 50, now);

        assert!(msg.starts_with("🔒 <b>Lista de Proxies HTTP/SOCKS</b>\n"));
        assert!(msg.contains("📅 Actualizado: 2026-01-02 09:05\n"));
        assert!(msg.contains("📊 Total: 57 proxies"));
        assert_eq!(msg.matches("<pre>").count(), 5);
        assert!(msg.contains(&list[49]));
        assert!(!msg.contains(&list[50]));
        assert!(msg.contains("curl --proxy"));
    }

    #[tokio::test]
    async fn failed_sources_are_skipped() {
        let good = serve("200 OK", "1.1.1.1:80\n2.2.2.2:8080\n").await;
        let broken = serve("500 Internal Server Error", "3.3.3.3:80\n").await;
        let fetcher = fetcher(vec![
            "http://127.0.0.1:9/".to_string(),
            broken,
            good,
        ]);

        assert_eq!(
            fetcher.fetch_proxies().await.unwrap(),
            vec!["1.1.1.1:80", "2.2.2.2:8080"]
        );
        assert_eq!(fetcher.random_proxies(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn all_sources_failing_is_an_error() {
        let broken = serve("503 Service Unavailable", "").await;
        let fetcher = fetcher(vec!["http://127.0.0.1:9/".to_string(), broken]);

        assert!(fetcher.fetch_proxies().await.is_err());
        assert!(fetcher.random_proxies(RANDOM_SAMPLE_SIZE).await.is_err());
    }

    #[tokio::test]
    async fn reachable_but_empty_source_is_not_an_error() {
        let empty = serve("200 OK", "no proxies today\n").await;
        let fetcher = fetcher(vec!["http://127.0.0.1:9/".to_string(), empty]);

        assert!(fetcher.fetch_proxies().await.unwrap().is_empty());
    }
}
