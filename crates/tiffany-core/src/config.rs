use std::{env, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and `.env` when present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_ids: Vec<i64>,

    // External chat-completion API
    pub chat_api_url: String,
    pub chat_api_key: Option<String>,

    // Files
    pub phrases_path: PathBuf,
    pub schedules_file: PathBuf,

    // Group behavior
    pub inactivity_timeout: Duration,
    pub max_news_per_message: usize,
    pub max_proxies_per_message: usize,
    pub reply_probability: f64,

    // Outbound HTTP
    pub http_timeout: Duration,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Existing environment wins over `.env`.
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::Config(format!("failed to read .env: {e}")));
            }
        }

        let bot_token = env_str("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));

        let chat_api_url =
            env_str("CHAT_API_URL").unwrap_or_else(|| "https://api.laozhang.com/chat".to_string());
        let chat_api_key = env_str("CHAT_API_KEY").and_then(non_empty);

        let phrases_path =
            PathBuf::from(env_str("PHRASES_PATH").unwrap_or_else(|| "frases.json".to_string()));
        let schedules_file = PathBuf::from(
            env_str("SCHEDULES_FILE").unwrap_or_else(|| "schedules.yaml".to_string()),
        );

        let inactivity_timeout =
            Duration::from_secs(env_u64("INACTIVITY_TIMEOUT_SECS").unwrap_or(300));
        let max_news_per_message = env_usize("MAX_NEWS_PER_MESSAGE").unwrap_or(5).max(1);
        let max_proxies_per_message = env_usize("MAX_PROXIES_PER_MESSAGE").unwrap_or(50).max(1);
        let reply_probability = env_f64("REPLY_PROBABILITY")
            .unwrap_or(0.3)
            .clamp(0.0, 1.0);

        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(10));

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(10);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        Ok(Self {
            bot_token,
            admin_ids,
            chat_api_url,
            chat_api_key,
            phrases_path,
            schedules_file,
            inactivity_timeout,
            max_news_per_message,
            max_proxies_per_message,
            reply_probability,
            http_timeout,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

impl Default for Config {
    /// Defaults without a token; used by tests and as a base for overrides.
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            chat_api_url: "https://api.laozhang.com/chat".to_string(),
            chat_api_key: None,
            phrases_path: PathBuf::from("frases.json"),
            schedules_file: PathBuf::from("schedules.yaml"),
            inactivity_timeout: Duration::from_secs(300),
            max_news_per_message: 5,
            max_proxies_per_message: 50,
            reply_probability: 0.3,
            http_timeout: Duration::from_secs(10),
            rate_limit_enabled: true,
            rate_limit_requests: 10,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env_str(key)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_ids_skip_garbage() {
        let ids = parse_csv_i64(Some(" 42, ,abc,-100123 ".to_string()));
        assert_eq!(ids, vec![42, -100123]);
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn bool_flags() {
        assert!(parse_bool("yes"));
        assert!(parse_bool(" TRUE "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn admin_lookup() {
        let cfg = Config {
            admin_ids: vec![7],
            ..Config::default()
        };
        assert!(cfg.is_admin(7));
        assert!(!cfg.is_admin(8));
    }
}
