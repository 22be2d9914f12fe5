use std::sync::Arc;

use tiffany_chat::ChatApiClient;

use tiffany_core::{
    config::Config,
    personality::{ActivityTracker, PhraseBook, Personality},
    ports::ChatCompletion,
};

#[tokio::main]
async fn main() -> Result<(), tiffany_core::Error> {
    tiffany_core::logging::init("tiffany")?;

    let cfg = Arc::new(Config::load()?);
    let http = tiffany_core::http::client(cfg.http_timeout)?;

    let phrases = PhraseBook::load(&cfg.phrases_path)?;

    let chat_api: Option<Arc<dyn ChatCompletion>> = match &cfg.chat_api_key {
        Some(key) => Some(Arc::new(ChatApiClient::new(
            cfg.chat_api_url.clone(),
            key.clone(),
            http.clone(),
        ))),
        None => {
            tracing::info!("CHAT_API_KEY not set, replying from local phrases only");
            None
        }
    };

    let personality = Arc::new(Personality::new(
        phrases,
        ActivityTracker::new(cfg.inactivity_timeout),
        chat_api,
    ));

    tiffany_telegram::router::run_polling(cfg, personality, http)
        .await
        .map_err(|e| tiffany_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
