use std::time::Duration;

use crate::Result;

const USER_AGENT: &str = concat!("tiffany-bot/", env!("CARGO_PKG_VERSION"));

/// Shared outbound HTTP client for feeds, proxy lists and the chat API.
pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(http)
}
