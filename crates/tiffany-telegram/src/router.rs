use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use tokio::sync::Mutex;

use tiffany_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use tiffany_core::{
    config::Config, messaging::port::MessagingPort, news::NewsFetcher, personality::Personality,
    proxies::ProxyFetcher, scheduler::JobScheduler, security::RateLimiter,
};

use crate::handlers::{self, commands::MENU};
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub news: NewsFetcher,
    pub proxies: ProxyFetcher,
    pub personality: Arc<Personality>,
    pub scheduler: JobScheduler,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    /// Our own `@username`, used to ignore commands addressed to other bots.
    pub bot_username: Option<String>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    personality: Arc<Personality>,
    http: reqwest::Client,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!("tiffany started: @{}", me.username());
            me.user.username.clone()
        }
        Err(e) => {
            tracing::warn!("get_me failed: {e}");
            None
        }
    };
    tracing::info!(admins = cfg.admin_ids.len(), "configuration loaded");

    let menu: Vec<BotCommand> = MENU
        .iter()
        .map(|(cmd, description)| BotCommand::new(*cmd, *description))
        .collect();
    if let Err(e) = bot.set_my_commands(menu).await {
        tracing::warn!("failed to register command menu: {e}");
    }

    // Throttle outbound traffic; RetryAfter is still retried in the adapter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let news = NewsFetcher::new(http.clone());
    let proxies = ProxyFetcher::new(http);

    let scheduler = JobScheduler::new(
        cfg.schedules_file.clone(),
        news.clone(),
        personality.clone(),
        messenger.clone(),
        cfg.max_news_per_message,
    );
    match scheduler.start().await {
        Ok(n) => tracing::info!(jobs = n, "scheduler started"),
        Err(e) => tracing::error!("failed to start scheduler: {e}"),
    }
    scheduler.ensure_watcher().await;

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger,
        news,
        proxies,
        personality,
        scheduler: scheduler.clone(),
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
        bot_username,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    scheduler.stop().await;
    tracing::info!("tiffany stopped");
    Ok(())
}
