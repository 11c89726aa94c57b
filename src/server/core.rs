//! Acceptor loop and per-session workers
//!
//! One tokio task per accepted control connection; the acceptor never
//! blocks on a session. Within a session everything is strictly
//! sequential: one command, one (or, for transfers, a 150/226 pair of)
//! reply. Shutdown is coordinated by closing the listener (dropping the
//! server) and letting in-flight sessions drain.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::auth::Credentials;
use crate::channel::ControlChannel;
use crate::error::ConnectionError;
use crate::logging::TranscriptLogger;
use crate::protocol::{Reply, parse_command};
use crate::server::config::ServerConfig;
use crate::server::dispatcher::{SessionFlow, dispatch};
use crate::server::session::Session;
use crate::storage::FsStorage;

pub struct Server {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    credentials: Arc<Credentials>,
    transcript: TranscriptLogger,
    active_sessions: Arc<AtomicUsize>,
}

impl Server {
    /// Binds the control listener and prepares the served root directory.
    pub async fn bind(
        config: ServerConfig,
        credentials: Credentials,
        transcript: TranscriptLogger,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.control_socket()).await?;
        let local = listener.local_addr()?;
        std::fs::create_dir_all(config.server_root_path())?;
        info!("server bound to {local}, root {}", config.server_root);
        transcript.server_started(local);
        Ok(Self {
            listener,
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            transcript,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The port actually bound; useful when `control_port` was 0.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts forever, spawning an independent worker per connection.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    log::debug!("accepted control connection from {peer}");
                    let config = Arc::clone(&self.config);
                    let credentials = Arc::clone(&self.credentials);
                    let transcript = self.transcript.clone();
                    let active = Arc::clone(&self.active_sessions);
                    tokio::spawn(async move {
                        serve_session(stream, config, credentials, transcript, active).await;
                    });
                }
                Err(e) => {
                    error!("accept failed: {e}");
                }
            }
        }
    }
}

/// Drives one control connection from greeting to close.
async fn serve_session(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    credentials: Arc<Credentials>,
    transcript: TranscriptLogger,
    active: Arc<AtomicUsize>,
) {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(e) => {
            warn!("session dropped before start: {e}");
            return;
        }
    };

    if active.fetch_add(1, Ordering::SeqCst) >= config.max_clients {
        warn!("client {peer} refused: server full");
        let mut channel = match ControlChannel::new(stream, transcript) {
            Ok(channel) => channel,
            Err(_) => {
                active.fetch_sub(1, Ordering::SeqCst);
                return;
            }
        };
        let _ = channel
            .send_reply(&Reply::new(421, "Too many connections. Try again later."))
            .await;
        active.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    info!("client {peer} connected");
    if let Err(e) = run_session(stream, &config, &credentials, transcript.clone()).await {
        match e {
            ConnectionError::Closed => info!("client {peer} disconnected"),
            ConnectionError::Io(e) => {
                transcript.error(&format!("session {peer}: {e}"));
                warn!("client {peer} session ended: {e}");
            }
        }
    } else {
        info!("client {peer} quit");
    }
    active.fetch_sub(1, Ordering::SeqCst);
}

async fn run_session(
    stream: TcpStream,
    config: &ServerConfig,
    credentials: &Credentials,
    transcript: TranscriptLogger,
) -> Result<(), ConnectionError> {
    let mut channel = ControlChannel::new(stream, transcript)?;
    let mut session = Session::new(
        channel.peer_addr(),
        channel.local_addr(),
        Box::new(FsStorage::new(config.server_root_path())),
    );

    channel
        .send_reply(&Reply::new(220, "ferroftp service ready"))
        .await?;

    loop {
        let line = channel.recv_line().await?;
        if line.len() > config.max_command_length {
            channel
                .send_reply(&Reply::new(500, "Command line too long."))
                .await?;
            continue;
        }
        let command = parse_command(&line);
        match dispatch(command, &mut session, &mut channel, credentials).await? {
            SessionFlow::Continue => {}
            SessionFlow::Quit => return Ok(()),
        }
    }
}
