//! Server configuration
//!
//! Layered the usual way: built-in defaults, then an optional `config.toml`,
//! then `FERROFTP_*` environment variables. The command line stays a thin
//! shim that may override the port and log destination on top of this.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address the control listener binds to.
    pub bind_address: String,
    /// Control connection port.
    pub control_port: u16,
    /// Root directory served to clients.
    pub server_root: String,
    /// Concurrent session cap; extra connections get a 421 and are closed.
    pub max_clients: usize,
    /// Control lines longer than this draw a 500 without being parsed.
    pub max_command_length: usize,
    /// Optional `user:pass` authorized-users file; the built-in development
    /// store is used when absent.
    pub credentials_file: Option<String>,
    /// Optional transcript log destination.
    pub transcript_log: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            control_port: 2121,
            server_root: "./server_root".to_string(),
            max_clients: 10,
            max_command_length: 512,
            credentials_file: None,
            transcript_log: None,
        }
    }
}

impl ServerConfig {
    /// Loads defaults, `config.toml` (if present), then the environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = ServerConfig::default();
        Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("control_port", i64::from(defaults.control_port))?
            .set_default("server_root", defaults.server_root)?
            .set_default("max_clients", defaults.max_clients as i64)?
            .set_default("max_command_length", defaults.max_command_length as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("FERROFTP"))
            .build()?
            .try_deserialize()
    }

    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }
}
