//! Telegram update handlers.
//!
//! Membership events, slash commands and plain chat text each get their own
//! module; everything user-visible goes out through the throttled messenger.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use tiffany_core::domain::{ChatId, MessageId, MessageRef};

use crate::router::AppState;

pub mod commands;
mod members;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.new_chat_members().is_some() || msg.left_chat_member().is_some() {
        return members::handle_members(msg, state).await;
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(msg, state).await;
    }

    text::handle_text(msg, state).await
}

/// Reference to the incoming message, for replies.
pub(crate) fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

/// `@username` when set, otherwise the first name.
pub(crate) fn display_name(user: &teloxide::types::User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| user.first_name.clone())
}
