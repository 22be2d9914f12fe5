use async_trait::async_trait;

use crate::Result;

/// Port for an external chat-completion service.
///
/// `Ok(None)` means the service answered but had nothing to say; `Err` means
/// it is unusable and the caller should fall back to local phrases.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, message: &str, bot_name: &str) -> Result<Option<String>>;
}
