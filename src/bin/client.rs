//! Client binary
//!
//! Usage: `ferroftp-client <host> [transcript-log] [port]`
//!
//! Prompts for a username and password, logs in, and drops into the
//! interactive prompt. A rejected login ends the program; everything after
//! that is driven by the prompt loop.

use std::io::Write;
use std::process;

use log::error;

use ferroftp::client::{CommandSequencer, prompt};
use ferroftp::error::FtpError;
use ferroftp::logging::TranscriptLogger;

const DEFAULT_PORT: u16 = 2121;

fn read_line(label: &str) -> String {
    print!("{label}: ");
    std::io::stdout().flush().ok();
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).ok();
    input.trim().to_string()
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(host) = args.get(1) else {
        eprintln!("usage: ferroftp-client <host> [transcript-log] [port]");
        process::exit(1);
    };
    let transcript = match args.get(2) {
        Some(path) => match TranscriptLogger::open(path) {
            Ok(transcript) => transcript,
            Err(e) => {
                error!("cannot open transcript log {path}: {e}");
                process::exit(1);
            }
        },
        None => TranscriptLogger::disabled(),
    };
    let port: u16 = match args.get(3) {
        Some(port) => match port.parse() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("invalid port: {port}");
                process::exit(1);
            }
        },
        None => DEFAULT_PORT,
    };

    let mut sequencer = match CommandSequencer::connect(host, port, transcript).await {
        Ok(sequencer) => sequencer,
        Err(e) => {
            eprintln!("Cannot connect to {host}:{port}: {e}");
            process::exit(1);
        }
    };

    let username = read_line("Username");
    let password = read_line("Password");
    if let Err(e) = sequencer.login(&username, &password).await {
        match e {
            FtpError::AuthenticationFailed(reply) => eprintln!("Incorrect Credentials ({reply})"),
            e => eprintln!("Login failed: {e}"),
        }
        process::exit(1);
    }
    println!("Logged in as {username}.");

    if let Err(e) = prompt::run(sequencer).await {
        error!("session ended: {e}");
        process::exit(1);
    }
}
