//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `alertgram.toml` file and environment variables,
//! taking precedence over both.

use crate::config::StoreBackend;
use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays monitoring alerts to subscribed Telegram chats.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the alert webhook binds to.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port the alert webhook listens on.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Directory containing message templates.
    #[arg(long, value_name = "DIR")]
    pub templates_dir: Option<PathBuf>,

    /// Subscriber store backend.
    #[arg(long, value_enum, value_name = "BACKEND")]
    pub store: Option<StoreBackend>,
}

/// Inserts `value` at a dotted `key` path, creating intermediate tables.
pub(crate) fn insert_nested(dict: &mut Dict, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::Dict(Tag::Default, Dict::new()));
            if let Value::Dict(_, inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
        None => {
            dict.insert(key.to_string(), value);
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(host) = &self.host {
            insert_nested(&mut dict, "server.host", Value::from(host.clone()));
        }

        if let Some(port) = self.port {
            insert_nested(&mut dict, "server.port", Value::from(u64::from(port)));
        }

        if let Some(level) = &self.log_level {
            insert_nested(&mut dict, "log_level", Value::from(level.clone()));
        }

        if let Some(dir) = &self.templates_dir {
            insert_nested(
                &mut dict,
                "templates.dir",
                Value::from(dir.display().to_string()),
            );
        }

        if let Some(backend) = self.store {
            insert_nested(&mut dict, "store.backend", Value::from(backend.to_string()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
