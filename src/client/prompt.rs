//! Interactive prompt
//!
//! A small line-oriented shell over [`CommandSequencer`]. Every verb maps to
//! one sequencer call; failure replies are printed and the session carries
//! on, while a dead control connection ends the loop.

use log::error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::client::sequencer::CommandSequencer;
use crate::error::FtpError;

const HELP: &str = "Commands:\n  pwd              print the remote working directory\n  cd <dir>         change the remote working directory\n  ls [path]        list a remote directory\n  get <remote>     download a file into the current directory\n  put <local>      upload a file\n  passive          toggle passive/active transfer mode\n  quit             close the session";

/// Reads commands from stdin until QUIT or a fatal error.
pub async fn run(mut sequencer: CommandSequencer) -> Result<(), FtpError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"ftp> ").await.ok();
        stdout.flush().await.ok();

        let Some(line) = lines.next_line().await.map_err(crate::error::ConnectionError::from)?
        else {
            // stdin closed; leave cleanly.
            sequencer.quit().await.ok();
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let verb = parts.next().unwrap_or_default();
        let argument = parts.next().map(str::trim);

        let outcome = match (verb, argument) {
            ("quit" | "exit", _) => {
                let result = sequencer.quit().await;
                if let Err(e) = result {
                    error!("quit failed: {e}");
                }
                println!("Goodbye.");
                return Ok(());
            }
            ("help" | "?", _) => {
                println!("{HELP}");
                Ok(())
            }
            ("pwd", _) => sequencer.pwd().await.map(|text| println!("{text}")),
            ("cd", Some(path)) => sequencer.cwd(path).await.map(|text| println!("{text}")),
            ("cd", None) => {
                println!("usage: cd <dir>");
                Ok(())
            }
            ("ls", path) => sequencer.list(path).await.map(|listing| {
                if listing.is_empty() {
                    println!("(empty)");
                } else {
                    println!("{listing}");
                }
            }),
            ("passive", _) => {
                let passive = sequencer.toggle_passive();
                println!(
                    "Transfer mode is now {}.",
                    if passive { "passive" } else { "active" }
                );
                Ok(())
            }
            ("get", Some(remote)) => download(&mut sequencer, remote).await,
            ("put", Some(local)) => upload(&mut sequencer, local).await,
            ("get", None) => {
                println!("usage: get <remote>");
                Ok(())
            }
            ("put", None) => {
                println!("usage: put <local>");
                Ok(())
            }
            _ => {
                println!("?Invalid command");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {}
            // Only a broken control connection ends the session.
            Err(FtpError::Connection(e)) => {
                println!("Connection lost: {e}");
                return Err(FtpError::Connection(e));
            }
            Err(e) => println!("{e}"),
        }
    }
}

async fn download(sequencer: &mut CommandSequencer, remote: &str) -> Result<(), FtpError> {
    let bytes = sequencer.retrieve(remote).await?;
    let local = remote.rsplit('/').next().unwrap_or(remote);
    match tokio::fs::write(local, &bytes).await {
        Ok(()) => println!("Saved {local} ({} bytes).", bytes.len()),
        Err(e) => println!("Cannot write {local}: {e}"),
    }
    Ok(())
}

async fn upload(sequencer: &mut CommandSequencer, local: &str) -> Result<(), FtpError> {
    let bytes = match tokio::fs::read(local).await {
        Ok(bytes) => bytes,
        Err(e) => {
            println!("Cannot read {local}: {e}");
            return Ok(());
        }
    };
    let remote = local.rsplit('/').next().unwrap_or(local);
    sequencer.store(remote, &bytes).await?;
    println!("Uploaded {remote} ({} bytes).", bytes.len());
    Ok(())
}
