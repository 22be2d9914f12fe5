//! Core domain logic for the Tiffany cybersecurity news bot.
//!
//! This crate is framework-agnostic. Telegram and the external chat API
//! live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod http;
pub mod logging;
pub mod messaging;
pub mod news;
pub mod personality;
pub mod ports;
pub mod proxies;
pub mod scheduler;
pub mod security;

pub use errors::{Error, Result};
