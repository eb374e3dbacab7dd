//! Runtime configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Duration;

use crate::notify::NotifyConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Flat-file order storage lives here unless a database is configured.
    pub data_dir: PathBuf,
    /// When set, orders are stored in the hosted Postgres mirror instead.
    pub database_url: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub catalog_ttl: StdDuration,
    /// How long an unpaid order is held before the expiry sweep cancels it.
    pub reservation_window: Duration,
    pub notify: Option<NotifyConfig>,
    /// Bearer token required on mutating endpoints; unset disables the gate.
    pub admin_token: Option<String>,
    pub default_currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.parse().context("PORT must be a port number")?,
            Err(_) => 8084,
        };
        let reservation_mins = match std::env::var("RESERVATION_WINDOW_MINS") {
            Ok(raw) => raw
                .parse()
                .context("RESERVATION_WINDOW_MINS must be minutes")?,
            Err(_) => 45,
        };
        let catalog_ttl_secs = match std::env::var("CATALOG_TTL_SECS") {
            Ok(raw) => raw.parse().context("CATALOG_TTL_SECS must be seconds")?,
            Err(_) => 60,
        };
        let notify = match (
            std::env::var("NOTIFY_BOT_TOKEN").ok(),
            std::env::var("NOTIFY_CHAT_ID").ok(),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(NotifyConfig { bot_token, chat_id }),
            // One without the other is a misconfiguration worth flagging,
            // but notifications stay best-effort, so only warn.
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!("incomplete notification credentials, notifications disabled");
                None
            }
            (None, None) => None,
        };
        Ok(Self {
            port,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/orders")),
            database_url: std::env::var("DATABASE_URL").ok(),
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
            catalog_ttl: StdDuration::from_secs(catalog_ttl_secs),
            reservation_window: Duration::minutes(reservation_mins),
            notify,
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            default_currency: std::env::var("DEFAULT_CURRENCY").unwrap_or_else(|_| "EUR".into()),
        })
    }
}
