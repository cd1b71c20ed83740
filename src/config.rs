//! Configuration management for alertgram
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer, from lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. an `alertgram.toml` file (or the file given with `--config`)
//! 3. `ALERTGRAM_`-prefixed environment variables, with `__` separating
//!    nested keys (e.g. `ALERTGRAM_SERVER__PORT=9000`)
//! 4. the unprefixed variables earlier deployments used (`BOT_TOKEN`,
//!    `SERVER_HOST`, `SERVER_PORT`, `DB_URI`, `DB_USERNAME`, `DB_PASSWORD`,
//!    `TEMPLATES_DIR`)
//! 5. command-line arguments

use crate::cli::{insert_nested, Cli};
use crate::dispatch::FanOutOrder;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map, Value},
    Figment, Metadata, Profile, Provider,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "alertgram.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Where the alert webhook listens.
    pub server: ServerConfig,
    /// Telegram Bot API settings.
    pub telegram: TelegramConfig,
    /// Subscriber store settings.
    pub store: StoreConfig,
    /// Message template settings.
    pub templates: TemplatesConfig,
    /// Fan-out behaviour.
    pub dispatch: DispatchConfig,
    /// Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct TelegramConfig {
    /// The bot token issued by BotFather.
    pub bot_token: String,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Whether to long-poll for chat commands.
    pub polling: bool,
    /// How long the server may hold a `getUpdates` request open.
    pub poll_timeout_seconds: u64,
    /// Timeout for individual API requests.
    pub request_timeout_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            polling: true,
            poll_timeout_seconds: 30,
            request_timeout_ms: 10_000,
        }
    }
}

// Keeps the bot token out of logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("polling", &self.polling)
            .field("poll_timeout_seconds", &self.poll_timeout_seconds)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Which backend holds the subscriber list.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Redis address, either `host:port` or a full `redis://` URL.
    pub uri: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Name of the Redis list holding subscribers.
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            uri: "127.0.0.1:6379".to_string(),
            username: None,
            password: None,
            key: "subscribers".to_string(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct TemplatesConfig {
    /// Directory of message templates. The built-in layout is used when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    pub order: FanOutOrder,
    /// Upper bound on a single message send.
    pub send_timeout_ms: u64,
    /// Upper bound on a single subscriber store operation.
    pub store_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Config {
    /// Loads the application configuration, layering every source on top of
    /// the defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g., ALERTGRAM_DISPATCH__ORDER=subscriber_major
            .merge(Env::prefixed("ALERTGRAM_").split("__"))
            .merge(VerbatimEnv(PREFIXED_STRING_VARS))
            .merge(Env::raw().only(&["SERVER_PORT"]).map(|_| "server.port".into()))
            .merge(VerbatimEnv(LEGACY_STRING_VARS))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

/// String settings that may be set through `ALERTGRAM_` variables. These are
/// re-read verbatim on top of the parsed `Env` layer.
const PREFIXED_STRING_VARS: &[(&str, &str)] = &[
    ("ALERTGRAM_LOG_LEVEL", "log_level"),
    ("ALERTGRAM_SERVER__HOST", "server.host"),
    ("ALERTGRAM_TELEGRAM__BOT_TOKEN", "telegram.bot_token"),
    ("ALERTGRAM_TELEGRAM__API_URL", "telegram.api_url"),
    ("ALERTGRAM_STORE__URI", "store.uri"),
    ("ALERTGRAM_STORE__USERNAME", "store.username"),
    ("ALERTGRAM_STORE__PASSWORD", "store.password"),
    ("ALERTGRAM_STORE__KEY", "store.key"),
    ("ALERTGRAM_TEMPLATES__DIR", "templates.dir"),
];

/// The unprefixed variables earlier deployments used, except `SERVER_PORT`.
const LEGACY_STRING_VARS: &[(&str, &str)] = &[
    ("BOT_TOKEN", "telegram.bot_token"),
    ("SERVER_HOST", "server.host"),
    ("DB_URI", "store.uri"),
    ("DB_USERNAME", "store.username"),
    ("DB_PASSWORD", "store.password"),
    ("TEMPLATES_DIR", "templates.dir"),
];

/// Maps environment variables onto config keys as plain strings.
///
/// `Env` parses values, so a password such as `0042` would arrive as the
/// integer 42. This provider never does.
struct VerbatimEnv(&'static [(&'static str, &'static str)]);

impl Provider for VerbatimEnv {
    fn metadata(&self) -> Metadata {
        Metadata::named("environment variable(s)")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        let mut dict = Dict::new();
        for (var, key) in self.0 {
            if let Ok(value) = std::env::var(var) {
                insert_nested(&mut dict, key, Value::from(value));
            }
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            telegram: TelegramConfig::default(),
            store: StoreConfig::default(),
            templates: TemplatesConfig::default(),
            dispatch: DispatchConfig {
                order: FanOutOrder::MessageMajor,
                send_timeout_ms: 5_000,
                store_timeout_ms: 2_000,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            },
        }
    }
}
