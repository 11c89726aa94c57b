//! Client command sequencer
//!
//! Owns the control channel and enforces the lockstep the protocol expects:
//! one command out, then read replies until the exchange is settled. For
//! transfers that means negotiating the data channel first, then sending
//! the verb, reading the 150, moving the bytes, and reading the 226. In
//! passive mode the data connection is opened before the verb goes out;
//! sending the verb first would let a server block in accept while we block
//! waiting for its reply.
//!
//! Failure replies (4xx/5xx) to ordinary commands surface as errors the
//! caller can print and survive; only a lost control connection or a
//! rejected login is fatal to the session.

use std::net::{IpAddr, SocketAddr};

use log::{debug, info};
use tokio::net::TcpStream;

use crate::channel::ControlChannel;
use crate::error::FtpError;
use crate::logging::TranscriptLogger;
use crate::protocol::{Reply, addr};
use crate::transfer::{DataChannelNegotiator, Direction, TransferMode};

pub struct CommandSequencer {
    channel: ControlChannel,
    passive: bool,
}

impl CommandSequencer {
    /// Connects to the server's control port and consumes the greeting.
    pub async fn connect(
        host: &str,
        port: u16,
        transcript: TranscriptLogger,
    ) -> Result<Self, FtpError> {
        transcript.connecting(&format!("{host}:{port}"));
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(crate::error::ConnectionError::from)?;
        let mut channel = ControlChannel::new(stream, transcript)?;
        let greeting = channel.recv_reply().await?;
        if !greeting.is_complete() {
            return Err(FtpError::Protocol(format!("unexpected greeting: {greeting}")));
        }
        info!("connected to {host}:{port}: {greeting}");
        Ok(Self {
            channel,
            passive: true,
        })
    }

    /// Sends one command line and reads the next reply.
    async fn exchange(&mut self, command: &str) -> Result<Reply, FtpError> {
        self.channel.send_line(command).await?;
        Ok(self.channel.recv_reply().await?)
    }

    /// Like `exchange` but treats any failure reply as an error carrying the
    /// reply text.
    async fn expect_success(&mut self, command: &str) -> Result<Reply, FtpError> {
        let reply = self.exchange(command).await?;
        if reply.is_failure() {
            return Err(FtpError::Protocol(reply.to_string()));
        }
        Ok(reply)
    }

    /// USER/PASS handshake followed by SYST. A rejected login is fatal; the
    /// caller is expected to drop the session.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), FtpError> {
        let user_reply = self.exchange(&format!("USER {username}")).await?;
        if !user_reply.is_intermediate() && !user_reply.is_complete() {
            return Err(FtpError::AuthenticationFailed(user_reply.to_string()));
        }
        let pass_reply = self.exchange(&format!("PASS {password}")).await?;
        if !pass_reply.is_complete() {
            return Err(FtpError::AuthenticationFailed(pass_reply.to_string()));
        }
        info!("logged in as {username}");
        let syst = self.exchange("SYST").await?;
        debug!("server system: {syst}");
        Ok(())
    }

    /// Whether transfers currently use passive mode.
    pub fn is_passive(&self) -> bool {
        self.passive
    }

    /// Flips between passive and active transfers, returning the new setting.
    pub fn toggle_passive(&mut self) -> bool {
        self.passive = !self.passive;
        self.passive
    }

    pub async fn pwd(&mut self) -> Result<String, FtpError> {
        let reply = self.expect_success("PWD").await?;
        Ok(reply.text)
    }

    pub async fn cwd(&mut self, path: &str) -> Result<String, FtpError> {
        let reply = self.expect_success(&format!("CWD {path}")).await?;
        Ok(reply.text)
    }

    pub async fn quit(&mut self) -> Result<(), FtpError> {
        let reply = self.exchange("QUIT").await?;
        debug!("server farewell: {reply}");
        self.channel.transcript().quit();
        Ok(())
    }

    /// Runs the mode-setup exchange for the next transfer and returns the
    /// negotiator the transfer will draw its connection from.
    async fn negotiate(&mut self) -> Result<DataChannelNegotiator, FtpError> {
        if self.passive {
            self.negotiate_passive().await
        } else {
            self.negotiate_active().await
        }
    }

    /// PASV (or EPSV against an IPv6 server), then an eager connect to the
    /// advertised address.
    async fn negotiate_passive(&mut self) -> Result<DataChannelNegotiator, FtpError> {
        let peer_ip = self.channel.peer_addr().ip();
        let verb = if peer_ip.is_ipv4() { "PASV" } else { "EPSV" };
        let reply = self.expect_success(verb).await?;
        let packed = addr::decode(&reply.text)?;
        let target = SocketAddr::new(packed.ip.unwrap_or(peer_ip), packed.port);
        debug!("passive data target {target}");
        let negotiator = DataChannelNegotiator::connect(target, TransferMode::Passive).await?;
        Ok(negotiator)
    }

    /// Binds a local listener and advertises it with PORT (IPv4) or EPRT
    /// (IPv6); the server connects back when the transfer starts.
    async fn negotiate_active(&mut self) -> Result<DataChannelNegotiator, FtpError> {
        let local_ip = self.channel.local_addr().ip();
        let negotiator = DataChannelNegotiator::listen(local_ip, TransferMode::Active).await?;
        let advertised = negotiator.local_addr().map_err(FtpError::Data)?;
        let command = match local_ip {
            IpAddr::V4(_) => {
                format!("PORT {}", addr::encode_packed(local_ip, advertised.port())?)
            }
            IpAddr::V6(v6) => format!("EPRT |2|{v6}|{}|", advertised.port()),
        };
        self.expect_success(&command).await?;
        Ok(negotiator)
    }

    /// Sends the transfer verb, requires a 1xx go-ahead, and hands back the
    /// established data connection.
    async fn open_transfer(
        &mut self,
        negotiator: &mut DataChannelNegotiator,
        verb: &str,
        direction: Direction,
    ) -> Result<crate::transfer::DataConnection, FtpError> {
        let go_ahead = self.expect_success(verb).await?;
        if !go_ahead.is_preliminary() {
            return Err(FtpError::Protocol(format!(
                "expected transfer go-ahead, got: {go_ahead}"
            )));
        }
        Ok(negotiator.establish(direction).await?)
    }

    /// Reads the completion reply once the data connection has closed.
    async fn finish_transfer(
        &mut self,
        mut negotiator: DataChannelNegotiator,
    ) -> Result<Reply, FtpError> {
        negotiator.finish();
        let done = self.channel.recv_reply().await?;
        if done.is_failure() {
            return Err(FtpError::Protocol(done.to_string()));
        }
        Ok(done)
    }

    /// Directory listing as the server formatted it, one name per line.
    pub async fn list(&mut self, path: Option<&str>) -> Result<String, FtpError> {
        let mut negotiator = self.negotiate().await?;
        let verb = match path {
            Some(path) => format!("LIST {path}"),
            None => "LIST".to_string(),
        };
        let conn = self
            .open_transfer(&mut negotiator, &verb, Direction::Receive)
            .await?;
        let bytes = conn.receive_all().await.map_err(FtpError::Data)?;
        self.finish_transfer(negotiator).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Downloads a remote file's contents.
    pub async fn retrieve(&mut self, remote: &str) -> Result<Vec<u8>, FtpError> {
        let mut negotiator = self.negotiate().await?;
        let conn = self
            .open_transfer(&mut negotiator, &format!("RETR {remote}"), Direction::Receive)
            .await?;
        let bytes = conn.receive_all().await.map_err(FtpError::Data)?;
        self.finish_transfer(negotiator).await?;
        info!("retrieved {remote} ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Uploads bytes to a remote path.
    pub async fn store(&mut self, remote: &str, contents: &[u8]) -> Result<(), FtpError> {
        let mut negotiator = self.negotiate().await?;
        let conn = self
            .open_transfer(&mut negotiator, &format!("STOR {remote}"), Direction::Send)
            .await?;
        conn.send_all(contents).await.map_err(FtpError::Data)?;
        self.finish_transfer(negotiator).await?;
        info!("stored {remote} ({} bytes)", contents.len());
        Ok(())
    }
}
