use std::sync::Arc;

use rand::Rng;
use teloxide::prelude::*;

use tiffany_core::{domain::ChatId, formatting::escape_html};

use crate::router::AppState;

use super::message_ref;

/// Private chats always get an answer; groups only with `probability`.
fn should_reply(is_private: bool, probability: f64, roll: f64) -> bool {
    is_private || roll < probability
}

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    let chat_id = ChatId(msg.chat.id.0);
    let roll: f64 = rand::thread_rng().gen();
    if !should_reply(msg.chat.is_private(), state.cfg.reply_probability, roll) {
        state.personality.activity().touch(chat_id).await;
        return Ok(());
    }

    let username = msg.from().and_then(|u| u.username.clone());
    let reply = state
        .personality
        .respond(text, username.as_deref(), Some(chat_id))
        .await;

    if let Err(e) = state
        .messenger
        .reply_html(message_ref(&msg), &escape_html(&reply))
        .await
    {
        tracing::warn!(chat_id = chat_id.0, "reply failed: {e}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_chats_always_reply() {
        assert!(should_reply(true, 0.0, 0.99));
    }

    #[test]
    fn groups_reply_below_probability() {
        assert!(should_reply(false, 0.3, 0.1));
        assert!(!should_reply(false, 0.3, 0.3));
        assert!(!should_reply(false, 0.0, 0.0));
        assert!(should_reply(false, 1.0, 0.999));
    }
}
