use std::{sync::Arc, time::Duration};

use chrono::Local;
use teloxide::prelude::*;

use tiffany_core::{
    domain::{MessageRef, UserId},
    formatting::escape_html,
    news::{format_news_message, FeedSource},
    proxies::{format_proxies_message, RANDOM_SAMPLE_SIZE},
};

use crate::router::AppState;

use super::message_ref;

/// Commands registered with `set_my_commands`. `/jobs` stays out of the menu.
pub const MENU: &[(&str, &str)] = &[
    ("start", "Inicia el bot"),
    ("news", "Últimas noticias de ciberseguridad"),
    ("hackernews", "Noticias de HackerNews"),
    ("zeroclick", "Noticias de ZeroClickZero"),
    ("proxies", "Lista completa de proxies"),
    ("randomproxies", "10 proxies aleatorios"),
    ("help", "Muestra la ayuda"),
];

const NEWS_WAIT: &str = "📡 Buscando noticias recientes...";
const NEWS_ERROR: &str = "❌ Error al obtener noticias. Intenta más tarde.";
const PROXIES_WAIT: &str = "🔍 Buscando proxies actualizados...";
const PROXIES_ERROR: &str = "❌ Error al obtener proxies. Intenta más tarde.";
const DIGEST_LABEL: &str = "Ciberseguridad";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Help,
    News(Option<FeedSource>),
    Proxies { random: bool },
    Jobs,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "start" | "help" => Self::Help,
            "news" => Self::News(None),
            "hackernews" => Self::News(Some(FeedSource::HackerNews)),
            "zeroclick" => Self::News(Some(FeedSource::ZeroClickZero)),
            "proxies" => Self::Proxies { random: false },
            "randomproxies" => Self::Proxies { random: true },
            "jobs" => Self::Jobs,
            _ => return None,
        })
    }

    /// Commands that hit external services and count against the rate limit.
    fn is_fetch(self) -> bool {
        matches!(self, Self::News(_) | Self::Proxies { .. })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedCommand {
    name: String,
    target: Option<String>,
    args: String,
}

fn parse_command(text: &str) -> ParsedCommand {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let args = parts.next().unwrap_or("").trim().to_string();

    let mut head = first.trim_start_matches('/').splitn(2, '@');
    let name = head.next().unwrap_or("").to_lowercase();
    let target = head
        .next()
        .map(str::to_string)
        .filter(|t| !t.is_empty());

    ParsedCommand { name, target, args }
}

/// `false` for `/cmd@otherbot`.
fn addressed_to_us(target: Option<&str>, bot_username: Option<&str>) -> bool {
    match (target, bot_username) {
        (Some(target), Some(me)) => target.eq_ignore_ascii_case(me),
        _ => true,
    }
}

fn help_text() -> String {
    [
        "👋 ¡Hola! Soy <b>Tiffany</b>, tu asistente de ciberseguridad.",
        "",
        "🔧 <b>Comandos disponibles:</b>",
        "• /news - Últimas noticias de ciberseguridad",
        "• /hackernews - Noticias de HackerNews",
        "• /zeroclick - Noticias de ZeroClickZero",
        "• /proxies - Lista de proxies actualizados",
        "• /randomproxies - 10 proxies aleatorios",
        "• /help - Muestra esta ayuda",
        "",
        "💬 También puedo conversar contigo sobre ciberseguridad y tecnología.",
    ]
    .join("\n")
}

fn rate_limited_text(retry_after: Duration) -> String {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    format!("⏳ Demasiadas solicitudes. Intenta de nuevo en {}s.", secs.max(1))
}

pub async fn handle_command(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let parsed = parse_command(text);
    if !addressed_to_us(parsed.target.as_deref(), state.bot_username.as_deref()) {
        return Ok(());
    }
    let Some(command) = Command::from_name(&parsed.name) else {
        tracing::debug!(command = %parsed.name, "ignoring unknown command");
        return Ok(());
    };

    let reply_to = message_ref(&msg);
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));
    tracing::info!(
        chat_id = reply_to.chat_id.0,
        user_id = user_id.map(|u| u.0),
        command = %parsed.name,
        "command received"
    );

    if command.is_fetch() {
        if let Some(user_id) = user_id {
            let verdict = state.rate_limiter.lock().await.check(user_id);
            if let Err(retry_after) = verdict {
                tracing::warn!(user_id = user_id.0, "rate limited");
                reply(&state, reply_to, &rate_limited_text(retry_after)).await;
                return Ok(());
            }
        }
    }

    match command {
        Command::Help => reply(&state, reply_to, &help_text()).await,
        Command::News(source) => send_news(&state, reply_to, source).await,
        Command::Proxies { random } => send_proxies(&state, reply_to, random).await,
        Command::Jobs => {
            let is_admin = user_id.is_some_and(|u| state.cfg.is_admin(u.0));
            handle_jobs(&state, reply_to, is_admin, &parsed.args).await
        }
    }

    Ok(())
}

async fn reply(state: &AppState, to: MessageRef, html: &str) {
    if let Err(e) = state.messenger.reply_html(to, html).await {
        tracing::warn!(chat_id = to.chat_id.0, "reply failed: {e}");
    }
}

/// Send the wait message and return it for later editing.
async fn wait_message(state: &AppState, to: MessageRef, text: &str) -> Option<MessageRef> {
    match state.messenger.reply_html(to, text).await {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(chat_id = to.chat_id.0, "failed to send wait message: {e}");
            None
        }
    }
}

/// Replace the wait message with `html`; if Telegram rejects it, show `fallback`.
async fn finish(state: &AppState, wait: MessageRef, html: &str, fallback: &str) {
    let Err(e) = state.messenger.edit_html(wait, html).await else {
        return;
    };
    tracing::error!(chat_id = wait.chat_id.0, "failed to deliver result: {e}");
    if let Err(e) = state.messenger.edit_html(wait, fallback).await {
        tracing::warn!(chat_id = wait.chat_id.0, "edit failed: {e}");
    }
}

async fn send_news(state: &AppState, to: MessageRef, source: Option<FeedSource>) {
    let Some(wait) = wait_message(state, to, NEWS_WAIT).await else {
        return;
    };

    let (items, label) = match source {
        Some(source) => (state.news.fetch(source).await, source.label()),
        None => (state.news.fetch_digest().await, DIGEST_LABEL),
    };

    let html = format_news_message(&items, label, state.cfg.max_news_per_message);
    finish(state, wait, &html, NEWS_ERROR).await;
}

async fn send_proxies(state: &AppState, to: MessageRef, random: bool) {
    let Some(wait) = wait_message(state, to, PROXIES_WAIT).await else {
        return;
    };

    let (result, kind) = if random {
        (
            state.proxies.random_proxies(RANDOM_SAMPLE_SIZE).await,
            "HTTP Aleatorios",
        )
    } else {
        (state.proxies.fetch_proxies().await, "HTTP/SOCKS")
    };

    let html = match result {
        Ok(list) => format_proxies_message(
            &list,
            kind,
            state.cfg.max_proxies_per_message,
            Local::now(),
        ),
        Err(e) => {
            tracing::error!("error sending proxies: {e}");
            PROXIES_ERROR.to_string()
        }
    };
    finish(state, wait, &html, PROXIES_ERROR).await;
}

async fn handle_jobs(state: &AppState, to: MessageRef, is_admin: bool, args: &str) {
    if !is_admin {
        reply(state, to, "⛔ Este comando es solo para administradores.").await;
        return;
    }

    if args.eq_ignore_ascii_case("reload") {
        let html = match state.scheduler.reload().await {
            Ok(n) => format!("🔄 Tareas recargadas: {n}"),
            Err(e) => format!(
                "❌ Error al recargar tareas: <code>{}</code>",
                escape_html(&e.to_string())
            ),
        };
        reply(state, to, &html).await;
        return;
    }

    reply(state, to, &state.scheduler.status_html().await).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_target_and_args() {
        assert_eq!(
            parse_command("/News@TiffanyBot  extra words "),
            ParsedCommand {
                name: "news".to_string(),
                target: Some("TiffanyBot".to_string()),
                args: "extra words".to_string(),
            }
        );
        assert_eq!(
            parse_command("/proxies"),
            ParsedCommand {
                name: "proxies".to_string(),
                target: None,
                args: String::new(),
            }
        );
    }

    #[test]
    fn commands_for_other_bots_are_skipped() {
        assert!(addressed_to_us(None, Some("tiffany_bot")));
        assert!(addressed_to_us(Some("Tiffany_Bot"), Some("tiffany_bot")));
        assert!(!addressed_to_us(Some("other_bot"), Some("tiffany_bot")));
        // Unknown own name: accept everything.
        assert!(addressed_to_us(Some("other_bot"), None));
    }

    #[test]
    fn command_table() {
        assert_eq!(Command::from_name("start"), Some(Command::Help));
        assert_eq!(Command::from_name("help"), Some(Command::Help));
        assert_eq!(Command::from_name("news"), Some(Command::News(None)));
        assert_eq!(
            Command::from_name("zeroclick"),
            Some(Command::News(Some(FeedSource::ZeroClickZero)))
        );
        assert_eq!(
            Command::from_name("randomproxies"),
            Some(Command::Proxies { random: true })
        );
        assert_eq!(Command::from_name("nope"), None);

        assert!(Command::News(None).is_fetch());
        assert!(!Command::Help.is_fetch());
        assert!(!Command::Jobs.is_fetch());
    }

    #[test]
    fn menu_entries_are_known_commands() {
        for (name, _) in MENU {
            assert!(Command::from_name(name).is_some(), "{name}");
        }
        assert!(MENU.iter().all(|(name, _)| *name != "jobs"));
    }

    #[test]
    fn help_lists_every_menu_command_but_start() {
        let help = help_text();
        for (name, _) in MENU.iter().filter(|(n, _)| *n != "start") {
            assert!(help.contains(&format!("/{name} ")), "{name}");
        }
    }

    #[test]
    fn rate_limit_message_rounds_up() {
        assert_eq!(
            rate_limited_text(Duration::from_millis(1500)),
            "⏳ Demasiadas solicitudes. Intenta de nuevo en 2s."
        );
        assert_eq!(
            rate_limited_text(Duration::ZERO),
            "⏳ Demasiadas solicitudes. Intenta de nuevo en 1s."
        );
    }
}
