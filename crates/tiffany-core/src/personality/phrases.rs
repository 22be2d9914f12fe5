use std::{collections::HashMap, fs, io, path::Path};

use rand::seq::SliceRandom;

use crate::Result;

pub const TOPIC_GENERAL: &str = "general";
pub const TOPIC_INACTIVITY: &str = "inactividad";

/// Keyword table, checked in order; the first topic with a matching keyword wins.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "ciberseguridad",
        &[
            "hack",
            "seguridad",
            "virus",
            "malware",
            "firewall",
            "ataque",
            "brecha",
            "vulnerabilidad",
        ],
    ),
    (
        "tecnologia",
        &["python", "linux", "windows", "programar", "código", "github", "git"],
    ),
    ("proxies", &["proxy", "vpn", "ip", "conexión", "anonimato"]),
    (
        "noticias",
        &["noticia", "novedad", "actualidad", "último", "nuevo"],
    ),
];

const FALLBACK_PHRASE: &str = "Interesante conversación.";

const DEFAULT_INACTIVITY: &[&str] = &[
    "¿Todos ocupados? 😄",
    "Parece que hay silencio por aquí...",
    "¿Nadie quiere hablar de ciberseguridad hoy?",
];

/// Topic keyword for `text`, or [`TOPIC_GENERAL`].
pub fn detect_topic(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(topic, _)| *topic)
        .unwrap_or(TOPIC_GENERAL)
}

/// Canned phrases grouped by topic.
#[derive(Clone, Debug)]
pub struct PhraseBook {
    topics: HashMap<String, Vec<String>>,
}

impl PhraseBook {
    pub fn new(topics: HashMap<String, Vec<String>>) -> Self {
        Self { topics }
    }

    /// Load a `{"topic": ["phrase", ...]}` JSON file.
    ///
    /// A missing file falls back to [`PhraseBook::default`]; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "phrase file not found, using default phrases"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let topics: HashMap<String, Vec<String>> = serde_json::from_str(raw)?;
        Ok(Self::new(topics))
    }

    fn phrases(&self, topic: &str) -> Option<&[String]> {
        self.topics
            .get(topic)
            .map(Vec::as_slice)
            .filter(|p| !p.is_empty())
    }

    /// Random phrase for `topic`, falling back to the general topic.
    pub fn topic_phrase(&self, topic: &str) -> String {
        let mut rng = rand::thread_rng();
        self.phrases(topic)
            .or_else(|| self.phrases(TOPIC_GENERAL))
            .and_then(|p| p.choose(&mut rng))
            .cloned()
            .unwrap_or_else(|| FALLBACK_PHRASE.to_string())
    }

    pub fn inactivity_phrase(&self) -> String {
        let mut rng = rand::thread_rng();
        let phrase = match self.phrases(TOPIC_INACTIVITY) {
            Some(p) => p.choose(&mut rng).cloned(),
            None => DEFAULT_INACTIVITY.choose(&mut rng).map(|s| s.to_string()),
        };
        phrase.unwrap_or_else(|| DEFAULT_INACTIVITY[0].to_string())
    }
}

impl Default for PhraseBook {
    fn default() -> Self {
        let topics = [
            ("ciberseguridad", "Hablando de ciberseguridad..."),
            (TOPIC_GENERAL, "Hola a todos!"),
        ]
        .into_iter()
        .map(|(topic, phrase)| (topic.to_string(), vec![phrase.to_string()]))
        .collect();
        Self::new(topics)
    }
}
