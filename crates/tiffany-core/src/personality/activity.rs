use std::{collections::HashMap, time::Duration};

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::ChatId;

/// Last-activity timestamps per chat, used for idle nudges.
#[derive(Debug)]
pub struct ActivityTracker {
    timeout: Duration,
    last_seen: Mutex<HashMap<ChatId, Instant>>,
}

impl ActivityTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn touch(&self, chat_id: ChatId) {
        self.touch_at(chat_id, Instant::now()).await;
    }

    pub async fn touch_at(&self, chat_id: ChatId, now: Instant) {
        self.last_seen.lock().await.insert(chat_id, now);
    }

    pub async fn is_inactive(&self, chat_id: ChatId) -> bool {
        self.is_inactive_at(chat_id, Instant::now()).await
    }

    /// A chat with no recorded activity counts as inactive.
    pub async fn is_inactive_at(&self, chat_id: ChatId, now: Instant) -> bool {
        match self.last_seen.lock().await.get(&chat_id) {
            Some(last) => now.saturating_duration_since(*last) > self.timeout,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_chat_is_inactive() {
        let tracker = ActivityTracker::new(Duration::from_secs(300));
        assert!(tracker.is_inactive(ChatId(-1)).await);
    }

    #[tokio::test]
    async fn compares_elapsed_against_timeout() {
        let tracker = ActivityTracker::new(Duration::from_secs(300));
        let chat = ChatId(-100);
        let t0 = Instant::now();
        tracker.touch_at(chat, t0).await;

        assert!(!tracker.is_inactive_at(chat, t0 + Duration::from_secs(10)).await);
        assert!(!tracker.is_inactive_at(chat, t0 + Duration::from_secs(300)).await);
        assert!(tracker.is_inactive_at(chat, t0 + Duration::from_secs(301)).await);
        // Multi-day silence stays inactive.
        assert!(
            tracker
                .is_inactive_at(chat, t0 + Duration::from_secs(86_400 + 5))
                .await
        );
    }

    #[tokio::test]
    async fn chats_are_tracked_independently() {
        let tracker = ActivityTracker::new(Duration::from_secs(60));
        let t0 = Instant::now();
        tracker.touch_at(ChatId(1), t0).await;

        assert!(!tracker.is_inactive_at(ChatId(1), t0).await);
        assert!(tracker.is_inactive_at(ChatId(2), t0).await);
    }
}
