use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Opslink API, e.g. "https://api.opslink.example".
    pub api_url: String,
    /// Websocket base URL for the live log channel. Derived from `api_url`
    /// (http → ws) when OPSLINK_WS_URL is not set.
    pub ws_url: String,
    /// Capacity of the bounded activity feed. Default: 100.
    pub feed_capacity: usize,
    /// How many historical entries the one-shot bootstrap requests.
    /// Default: 100.
    pub bootstrap_limit: usize,
    /// Durable mirror for the access credential.
    pub credentials_file: PathBuf,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let api_url = std::env::var("OPSLINK_API_URL")
        .unwrap_or_else(|_| "http://localhost:5000".into());

    let ws_url = std::env::var("OPSLINK_WS_URL").unwrap_or_else(|_| {
        api_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    });

    let credentials_file = match std::env::var("OPSLINK_CREDENTIALS_FILE") {
        Ok(p) => PathBuf::from(p),
        Err(_) => directories::ProjectDirs::from("", "", "opslink")
            .map(|d| d.data_dir().join("credentials.json"))
            .unwrap_or_else(|| PathBuf::from(".opslink-credentials.json")),
    };

    let feed_capacity = std::env::var("OPSLINK_FEED_CAPACITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    if feed_capacity == 0 {
        anyhow::bail!("OPSLINK_FEED_CAPACITY must be at least 1");
    }

    Ok(Config {
        api_url,
        ws_url,
        feed_capacity,
        bootstrap_limit: std::env::var("OPSLINK_BOOTSTRAP_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100),
        credentials_file,
    })
}
