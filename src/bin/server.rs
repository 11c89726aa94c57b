//! Server binary
//!
//! Usage: `ferroftp-server [transcript-log] [port]`
//!
//! Configuration is layered from built-in defaults, `config.toml`, and
//! `FERROFTP_*` environment variables; positional arguments override the
//! transcript destination and control port on top of that.

use std::process;

use log::{error, info};

use ferroftp::auth::Credentials;
use ferroftp::logging::TranscriptLogger;
use ferroftp::server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().collect();
    if let Some(logfile) = args.get(1) {
        config.transcript_log = Some(logfile.clone());
    }
    if let Some(port) = args.get(2) {
        match port.parse() {
            Ok(port) => config.control_port = port,
            Err(_) => {
                eprintln!("invalid port: {port}");
                process::exit(1);
            }
        }
    }

    let credentials = match &config.credentials_file {
        Some(path) => match Credentials::from_file(path) {
            Ok(credentials) => credentials,
            Err(e) => {
                error!("failed to load credentials from {path}: {e}");
                process::exit(1);
            }
        },
        None => {
            info!("no credentials file configured; using built-in development accounts");
            Credentials::development()
        }
    };

    let transcript = match &config.transcript_log {
        Some(path) => match TranscriptLogger::open(path) {
            Ok(transcript) => transcript,
            Err(e) => {
                error!("cannot open transcript log {path}: {e}");
                process::exit(1);
            }
        },
        None => TranscriptLogger::disabled(),
    };

    let server = match Server::bind(config, credentials, transcript).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to start server: {e}");
            process::exit(1);
        }
    };

    server.run().await;
}
