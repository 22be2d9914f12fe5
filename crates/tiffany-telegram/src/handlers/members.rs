use std::sync::Arc;

use teloxide::prelude::*;

use tiffany_core::formatting::escape_html;

use crate::router::AppState;

use super::{display_name, message_ref};

/// Greet arriving members and say goodbye to departing ones. Bots are skipped.
pub async fn handle_members(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let reply_to = message_ref(&msg);

    if let Some(members) = msg.new_chat_members() {
        for member in members.iter().filter(|m| !m.is_bot) {
            let greeting = state.personality.greeting(&display_name(member));
            if let Err(e) = state
                .messenger
                .reply_html(reply_to, &escape_html(&greeting))
                .await
            {
                tracing::warn!(chat_id = reply_to.chat_id.0, "greeting failed: {e}");
            }
        }
        return Ok(());
    }

    if let Some(member) = msg.left_chat_member().filter(|m| !m.is_bot) {
        let farewell = state.personality.farewell(&display_name(member));
        if let Err(e) = state
            .messenger
            .reply_html(reply_to, &escape_html(&farewell))
            .await
        {
            tracing::warn!(chat_id = reply_to.chat_id.0, "farewell failed: {e}");
        }
    }

    Ok(())
}
