//! Command dispatch (server role)
//!
//! Maps a parsed command to its handler, gated by the session's
//! authentication state: everything except USER, PASS and QUIT is rejected
//! with a 530 until login completes. Handlers convert every recoverable
//! failure into a protocol reply; only `ConnectionError` escapes, and it
//! tears the session down.

use std::net::SocketAddr;

use log::{error, info};

use crate::auth::Credentials;
use crate::channel::ControlChannel;
use crate::error::{ConnectionError, StorageError};
use crate::protocol::{Command, Reply, addr};
use crate::server::session::Session;
use crate::transfer::{DataChannelNegotiator, Direction, TransferMode};

/// What the session loop should do after a command has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Quit,
}

pub async fn dispatch(
    command: Command,
    session: &mut Session,
    channel: &mut ControlChannel,
    credentials: &Credentials,
) -> Result<SessionFlow, ConnectionError> {
    // Authentication gate. USER/PASS/QUIT are the only verbs an anonymous
    // peer may issue.
    match &command {
        Command::User(_) | Command::Pass(_) | Command::Quit => {}
        _ if !session.is_authenticated() => {
            channel
                .send_reply(&Reply::new(530, "Not logged in."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
        _ => {}
    }

    match command {
        Command::User(username) => handle_user(session, channel, &username).await,
        Command::Pass(password) => handle_pass(session, channel, credentials, &password).await,
        Command::Syst => {
            channel
                .send_reply(&Reply::new(
                    215,
                    format!("System: {}", std::env::consts::OS),
                ))
                .await?;
            Ok(SessionFlow::Continue)
        }
        Command::Pwd => {
            let dir = session.storage().current_directory();
            channel
                .send_reply(&Reply::new(
                    257,
                    format!("\"{dir}\" is the current directory"),
                ))
                .await?;
            Ok(SessionFlow::Continue)
        }
        Command::Cwd(path) => handle_cwd(session, channel, &path).await,
        Command::Cdup => handle_cwd(session, channel, "..").await,
        Command::Pasv => handle_pasv(session, channel, false).await,
        Command::Epsv => handle_pasv(session, channel, true).await,
        Command::Port(arg) => handle_port(session, channel, &arg).await,
        Command::Eprt(arg) => handle_port(session, channel, &arg).await,
        Command::List(path) => handle_list(session, channel, path.as_deref()).await,
        Command::Retr(name) => handle_retr(session, channel, &name).await,
        Command::Stor(name) => handle_stor(session, channel, &name).await,
        Command::Quit => {
            channel.send_reply(&Reply::new(221, "Goodbye.")).await?;
            Ok(SessionFlow::Quit)
        }
        Command::MissingArgument(verb) => {
            info!("client {} sent {verb} without argument", session.peer_addr());
            channel
                .send_reply(&Reply::new(501, "Syntax error in parameters or arguments."))
                .await?;
            Ok(SessionFlow::Continue)
        }
        Command::Unknown(verb) => {
            info!("client {} sent unknown verb {verb:?}", session.peer_addr());
            channel
                .send_reply(&Reply::new(500, "Syntax error, command unrecognized."))
                .await?;
            Ok(SessionFlow::Continue)
        }
    }
}

async fn handle_user(
    session: &mut Session,
    channel: &mut ControlChannel,
    username: &str,
) -> Result<SessionFlow, ConnectionError> {
    session.set_username(username);
    channel
        .send_reply(&Reply::new(331, "Please specify the password."))
        .await?;
    Ok(SessionFlow::Continue)
}

async fn handle_pass(
    session: &mut Session,
    channel: &mut ControlChannel,
    credentials: &Credentials,
    password: &str,
) -> Result<SessionFlow, ConnectionError> {
    let Some(username) = session.username().map(str::to_string) else {
        channel
            .send_reply(&Reply::new(503, "Login with USER first."))
            .await?;
        return Ok(SessionFlow::Continue);
    };
    if credentials.authenticate(&username, password) {
        session.set_authenticated(true);
        info!("client {} logged in as {username}", session.peer_addr());
        channel
            .send_reply(&Reply::new(230, "Login successful."))
            .await?;
    } else {
        session.set_authenticated(false);
        info!(
            "client {} failed login as {username}",
            session.peer_addr()
        );
        channel
            .send_reply(&Reply::new(530, "Login incorrect."))
            .await?;
    }
    Ok(SessionFlow::Continue)
}

async fn handle_cwd(
    session: &mut Session,
    channel: &mut ControlChannel,
    path: &str,
) -> Result<SessionFlow, ConnectionError> {
    match session.storage_mut().change_directory(path) {
        Ok(()) => {
            channel
                .send_reply(&Reply::new(250, "Directory successfully changed."))
                .await?
        }
        Err(e) => {
            info!("client {} CWD {path:?} refused: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(550, "Failed to change directory."))
                .await?
        }
    }
    Ok(SessionFlow::Continue)
}

/// PASV and EPSV: bind a fresh listener next to the control connection and
/// advertise it. The accept happens lazily, when the transfer command asks
/// for the stream.
async fn handle_pasv(
    session: &mut Session,
    channel: &mut ControlChannel,
    extended: bool,
) -> Result<SessionFlow, ConnectionError> {
    let bind_ip = session.local_addr().ip();
    if !extended && !bind_ip.is_ipv4() {
        channel
            .send_reply(&Reply::new(425, "Use EPSV for this address family."))
            .await?;
        return Ok(SessionFlow::Continue);
    }
    let negotiator = match DataChannelNegotiator::listen(bind_ip, TransferMode::Passive).await {
        Ok(negotiator) => negotiator,
        Err(e) => {
            error!("client {}: passive bind failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(425, "Can't open data connection."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    let local = match negotiator.local_addr() {
        Ok(local) => local,
        Err(e) => {
            error!("client {}: passive bind failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(425, "Can't open data connection."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    let reply = if extended {
        Reply::new(
            229,
            format!(
                "Entering Extended Passive Mode ({})",
                addr::encode_extended(local.port())
            ),
        )
    } else {
        // The bind IP was checked above, so packing cannot fail here.
        let payload = addr::encode_packed(local.ip(), local.port())
            .expect("IPv4 address checked before bind");
        Reply::new(227, format!("Entering Passive Mode ({payload})"))
    };
    session.set_pending_data(negotiator);
    info!(
        "client {} entering passive mode via {local}",
        session.peer_addr()
    );
    channel.send_reply(&reply).await?;
    Ok(SessionFlow::Continue)
}

/// PORT and EPRT: decode the client's advertised address and remember it;
/// the outgoing connection is opened when the transfer needs it.
async fn handle_port(
    session: &mut Session,
    channel: &mut ControlChannel,
    argument: &str,
) -> Result<SessionFlow, ConnectionError> {
    let packed = match addr::decode(argument) {
        Ok(packed) => packed,
        Err(e) => {
            info!("client {}: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(501, "Syntax error in parameters or arguments."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    // Port-only extended form: reuse the control connection's peer address.
    let ip = packed.ip.unwrap_or_else(|| session.peer_addr().ip());
    let peer = SocketAddr::new(ip, packed.port);
    session.set_pending_data(DataChannelNegotiator::outbound(peer, TransferMode::Active));
    info!(
        "client {} entering active mode towards {peer}",
        session.peer_addr()
    );
    channel
        .send_reply(&Reply::new(200, "PORT command successful. Consider using PASV."))
        .await?;
    Ok(SessionFlow::Continue)
}

/// Consumes the session's pending negotiation, or answers 425 if there is
/// none. Every transfer verb starts here.
async fn take_negotiator(
    session: &mut Session,
    channel: &mut ControlChannel,
) -> Result<Option<DataChannelNegotiator>, ConnectionError> {
    match session.take_pending_data() {
        Some(negotiator) => Ok(Some(negotiator)),
        None => {
            channel
                .send_reply(&Reply::new(425, "Use PORT or PASV first."))
                .await?;
            Ok(None)
        }
    }
}

async fn handle_list(
    session: &mut Session,
    channel: &mut ControlChannel,
    path: Option<&str>,
) -> Result<SessionFlow, ConnectionError> {
    let Some(mut negotiator) = take_negotiator(session, channel).await? else {
        return Ok(SessionFlow::Continue);
    };

    // An explicit path is listed by stepping into it for the duration of
    // the command.
    let saved_cwd = session.storage().current_directory();
    if let Some(path) = path {
        if let Err(e) = session.storage_mut().change_directory(path) {
            info!("client {} LIST {path:?} refused: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(550, "Failed to list directory."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    }
    let entries = session.storage().list_entries();
    if path.is_some() {
        // Restore the working directory whether or not listing succeeded.
        let _ = session.storage_mut().change_directory(&saved_cwd);
    }
    let entries = match entries {
        Ok(entries) => entries,
        Err(e) => {
            error!("client {} LIST failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(550, "Failed to list directory."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };

    channel
        .send_reply(&Reply::new(150, "Here comes the directory listing."))
        .await?;
    let connection = match negotiator.establish(Direction::Send).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("client {}: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(425, "Can't open data connection."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };

    let mut listing = String::new();
    for entry in &entries {
        listing.push_str(entry);
        listing.push_str("\r\n");
    }
    let outcome = connection.send_all(listing.as_bytes()).await;
    negotiator.finish();
    match outcome {
        Ok(()) => {
            info!(
                "client {} listed {} entries",
                session.peer_addr(),
                entries.len()
            );
            channel
                .send_reply(&Reply::new(226, "Directory send OK."))
                .await?
        }
        Err(e) => {
            error!("client {} LIST transfer failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(426, "Connection closed; transfer aborted."))
                .await?
        }
    }
    Ok(SessionFlow::Continue)
}

async fn handle_retr(
    session: &mut Session,
    channel: &mut ControlChannel,
    name: &str,
) -> Result<SessionFlow, ConnectionError> {
    let Some(mut negotiator) = take_negotiator(session, channel).await? else {
        return Ok(SessionFlow::Continue);
    };

    let bytes = match session.storage().read_file(name) {
        Ok(bytes) => bytes,
        Err(StorageError::FileNotFound(path)) => {
            channel
                .send_reply(&Reply::new(550, format!("{path}: File not found")))
                .await?;
            return Ok(SessionFlow::Continue);
        }
        Err(e) => {
            error!("client {} RETR {name:?} failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(550, "Failed to open file."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };

    channel
        .send_reply(&Reply::new(150, "Opening BINARY mode data connection."))
        .await?;
    let connection = match negotiator.establish(Direction::Send).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("client {}: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(425, "Can't open data connection."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    let outcome = connection.send_all(&bytes).await;
    negotiator.finish();
    match outcome {
        Ok(()) => {
            info!(
                "client {} retrieved {name:?} ({} bytes)",
                session.peer_addr(),
                bytes.len()
            );
            channel
                .send_reply(&Reply::new(226, "Transfer complete."))
                .await?
        }
        Err(e) => {
            error!("client {} RETR transfer failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(426, "Connection closed; transfer aborted."))
                .await?
        }
    }
    Ok(SessionFlow::Continue)
}

async fn handle_stor(
    session: &mut Session,
    channel: &mut ControlChannel,
    name: &str,
) -> Result<SessionFlow, ConnectionError> {
    let Some(mut negotiator) = take_negotiator(session, channel).await? else {
        return Ok(SessionFlow::Continue);
    };

    channel
        .send_reply(&Reply::new(150, "Ok to send data."))
        .await?;
    let connection = match negotiator.establish(Direction::Receive).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("client {}: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(425, "Can't open data connection."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    let received = connection.receive_all().await;
    negotiator.finish();
    let bytes = match received {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("client {} STOR transfer failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(426, "Connection closed; transfer aborted."))
                .await?;
            return Ok(SessionFlow::Continue);
        }
    };
    match session.storage_mut().write_file(name, &bytes) {
        Ok(()) => {
            info!(
                "client {} stored {name:?} ({} bytes)",
                session.peer_addr(),
                bytes.len()
            );
            channel
                .send_reply(&Reply::new(226, "Transfer complete."))
                .await?
        }
        Err(e) => {
            error!("client {} STOR {name:?} failed: {e}", session.peer_addr());
            channel
                .send_reply(&Reply::new(550, "Failed to store file."))
                .await?
        }
    }
    Ok(SessionFlow::Continue)
}
