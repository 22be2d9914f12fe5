//! Conversational persona: greetings, canned topic replies and idle nudges.

mod activity;
mod phrases;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rand::seq::SliceRandom;

use crate::{domain::ChatId, ports::ChatCompletion};

pub use activity::ActivityTracker;
pub use phrases::{detect_topic, PhraseBook, TOPIC_GENERAL};

pub const BOT_NAME: &str = "Tiffany";

const FAREWELL_KEYWORDS: &[&str] = &["adiós", "hasta luego"];
const GREETING_KEYWORDS: &[&str] = &["hola", "buenos días"];

pub struct Personality {
    phrases: PhraseBook,
    activity: ActivityTracker,
    chat_api: Option<Arc<dyn ChatCompletion>>,
    api_available: AtomicBool,
}

impl Personality {
    pub fn new(
        phrases: PhraseBook,
        activity: ActivityTracker,
        chat_api: Option<Arc<dyn ChatCompletion>>,
    ) -> Self {
        let api_available = AtomicBool::new(chat_api.is_some());
        Self {
            phrases,
            activity,
            chat_api,
            api_available,
        }
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn api_available(&self) -> bool {
        self.api_available.load(Ordering::Relaxed)
    }

    pub fn greeting(&self, name: &str) -> String {
        let templates = [
            format!("¡Hola @{name}! 👋 Bienvenido al grupo de ciberseguridad."),
            format!("¡Saludos @{name}! 🛡️ ¿Te gusta la ciberseguridad?"),
            format!("¡Bienvenido @{name}! 🔐 Aquí hablamos de seguridad y tecnología."),
        ];
        pick(templates)
    }

    pub fn farewell(&self, name: &str) -> String {
        let templates = [
            format!("Hasta luego @{name} 👋"),
            format!("Nos vemos pronto @{name} 👋"),
            format!("¡Que tengas buen día @{name}! 👋"),
        ];
        pick(templates)
    }

    pub fn inactivity_message(&self) -> String {
        self.phrases.inactivity_phrase()
    }

    /// Reply to an ordinary chat message and record the chat as active.
    ///
    /// The external chat API is tried first while it is available; the first
    /// failure disables it for the rest of the process.
    pub async fn respond(
        &self,
        text: &str,
        username: Option<&str>,
        chat_id: Option<ChatId>,
    ) -> String {
        if let Some(chat_id) = chat_id {
            self.activity.touch(chat_id).await;
        }

        if let Some(reply) = self.ask_chat_api(text).await {
            return reply;
        }

        self.local_reply(text, username)
    }

    async fn ask_chat_api(&self, text: &str) -> Option<String> {
        let api = self.chat_api.as_ref()?;
        if !self.api_available() {
            return None;
        }

        match api.complete(text, BOT_NAME).await {
            Ok(reply) => reply.filter(|r| !r.trim().is_empty()),
            Err(e) => {
                self.api_available.store(false, Ordering::Relaxed);
                tracing::warn!("chat API unavailable, falling back to local phrases: {e}");
                None
            }
        }
    }

    /// Keyword-based reply from the phrase table.
    pub fn local_reply(&self, text: &str, username: Option<&str>) -> String {
        let lower = text.to_lowercase();

        if FAREWELL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return match username {
                Some(name) => format!("Hasta luego @{name} 👋"),
                None => "Hasta luego 👋".to_string(),
            };
        }

        if GREETING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return match username {
                Some(name) => self.greeting(name),
                None => "¡Hola a todos! 👋".to_string(),
            };
        }

        self.phrases.topic_phrase(detect_topic(text))
    }
}

fn pick<const N: usize>(options: [String; N]) -> String {
    let mut rng = rand::thread_rng();
    options.choose(&mut rng).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{Error, Result};

    struct FixedApi(Result<Option<String>>);

    #[async_trait]
    impl ChatCompletion for FixedApi {
        async fn complete(&self, _message: &str, bot_name: &str) -> Result<Option<String>> {
            assert_eq!(bot_name, BOT_NAME);
            match &self.0 {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(Error::External(e.to_string())),
            }
        }
    }

    fn book() -> PhraseBook {
        let topics = HashMap::from([
            ("ciberseguridad".to_string(), vec!["sec".to_string()]),
            ("general".to_string(), vec!["gen".to_string()]),
        ]);
        PhraseBook::new(topics)
    }

    fn personality(api: Option<FixedApi>) -> Personality {
        Personality::new(
            book(),
            ActivityTracker::new(Duration::from_secs(300)),
            api.map(|a| Arc::new(a) as Arc<dyn ChatCompletion>),
        )
    }

    #[test]
    fn greeting_and_farewell_mention_user() {
        let p = personality(None);
        assert!(p.greeting("neo").contains("@neo"));
        assert!(p.farewell("trinity").contains("@trinity"));
    }

    #[test]
    fn local_reply_priorities() {
        let p = personality(None);
        assert_eq!(
            p.local_reply("Bueno, hasta luego, hola", Some("neo")),
            "Hasta luego @neo 👋"
        );
        assert_eq!(p.local_reply("adiós", None), "Hasta luego 👋");
        assert_eq!(p.local_reply("Hola!", None), "¡Hola a todos! 👋");
        assert!(p.local_reply("Buenos días", Some("neo")).contains("@neo"));
        assert_eq!(p.local_reply("un nuevo malware", None), "sec");
        assert_eq!(p.local_reply("qué tal", None), "gen");
    }

    #[tokio::test]
    async fn respond_records_activity() {
        let p = personality(None);
        let chat = ChatId(-42);
        assert!(p.activity().is_inactive(chat).await);

        let reply = p.respond("qué tal", None, Some(chat)).await;
        assert_eq!(reply, "gen");
        assert!(!p.activity().is_inactive(chat).await);
    }

    #[tokio::test]
    async fn chat_api_reply_wins() {
        let p = personality(Some(FixedApi(Ok(Some("from api".to_string())))));
        let reply = p.respond("hola", Some("neo"), None).await;
        assert_eq!(reply, "from api");
        assert!(p.api_available());
    }

    #[tokio::test]
    async fn empty_api_reply_falls_back_without_disabling() {
        let p = personality(Some(FixedApi(Ok(Some("  ".to_string())))));
        let reply = p.respond("qué tal", None, None).await;
        assert_eq!(reply, "gen");
        assert!(p.api_available());
    }

    #[tokio::test]
    async fn api_failure_disables_api() {
        let p = personality(Some(FixedApi(Err(Error::External("503".to_string())))));
        let reply = p.respond("qué tal", None, None).await;
        assert_eq!(reply, "gen");
        assert!(!p.api_available());
    }
}
