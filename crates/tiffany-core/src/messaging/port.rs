use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Outbound messaging port.
///
/// All text is Telegram-flavoured HTML; callers escape user/feed content with
/// [`crate::formatting::escape_html`].
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send `html` as a reply to `to`.
    async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef>;

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;
}
