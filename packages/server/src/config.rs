//! Command line / environment configuration.
//!
//! Every option can be given as a flag or an environment variable. A `.env`
//! file in the working directory is loaded by the binary before parsing.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

/// Configuration errors detected after parsing
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid homeserver URL '{url}': {reason}")]
    InvalidHomeserverUrl { url: String, reason: String },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "kakehashi-server")]
#[command(about = "Bridge Matrix rooms to browser WebSocket clients", long_about = None)]
pub struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "KAKEHASHI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "KAKEHASHI_PORT", default_value = "1237")]
    pub port: u16,

    /// Path of the SQLite room database
    #[arg(long, env = "KAKEHASHI_DATABASE", default_value = "./rooms.db")]
    pub database: PathBuf,

    /// Homeserver domain (the client API is reached at https://<host>)
    #[arg(long, env = "HOMESERVER_HOST")]
    pub homeserver_host: String,

    /// Explicit homeserver base URL, overrides https://<homeserver-host>
    #[arg(long, env = "HOMESERVER_URL")]
    pub homeserver_url: Option<String>,

    /// Token used for calls to the homeserver
    #[arg(long, env = "AS_TOKEN", hide_env_values = true)]
    pub as_token: String,

    /// Token the homeserver presents when pushing transactions
    #[arg(long, env = "HS_TOKEN", hide_env_values = true)]
    pub hs_token: String,

    /// User the bridge sends messages as
    #[arg(long, env = "USER_ID")]
    pub user_id: String,

    /// Capacity of the relay queue between event ingress and the broadcaster
    #[arg(long, env = "RELAY_QUEUE_CAPACITY", default_value = "1024")]
    pub relay_queue_capacity: usize,

    /// How long ingress waits on a full relay queue before dropping a message
    #[arg(long, env = "ENQUEUE_TIMEOUT_MS", default_value = "5000")]
    pub enqueue_timeout_ms: u64,
}

impl Args {
    /// Base URL of the homeserver client-server API
    pub fn homeserver_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.homeserver_url {
            Some(url) => url.clone(),
            None => format!("https://{}", self.homeserver_host),
        };
        Url::parse(&raw).map_err(|e| ConfigError::InvalidHomeserverUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}
