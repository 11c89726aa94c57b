//! Control channel
//!
//! Wraps the one long-lived TCP connection that carries commands and
//! replies. Lines are CRLF-terminated ASCII; `recv_line` uses terminator
//! framing (`read_line`), so a command split across TCP segments is still
//! one application-level unit. Oversized lines are the caller's problem to
//! reject; the channel only reads and reports them.
//!
//! The underlying socket is released exactly once, when the channel is
//! dropped, regardless of which path ends the session (QUIT, error, or
//! forced shutdown).

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{ConnectionError, FtpError};
use crate::logging::TranscriptLogger;
use crate::protocol::Reply;

pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    transcript: TranscriptLogger,
    local_addr: std::net::SocketAddr,
    peer_addr: std::net::SocketAddr,
}

impl ControlChannel {
    pub fn new(stream: TcpStream, transcript: TranscriptLogger) -> Result<Self, ConnectionError> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            transcript,
            local_addr,
            peer_addr,
        })
    }

    /// Our end of the connection; PASV/EPSV listeners bind to this IP.
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// The peer's end; EPRT port-only payloads reuse this IP.
    pub fn peer_addr(&self) -> std::net::SocketAddr {
        self.peer_addr
    }

    pub fn transcript(&self) -> &TranscriptLogger {
        &self.transcript
    }

    /// Appends CRLF and writes the whole line. A partial or failed write is
    /// not recovered; the operation is abandoned with a `ConnectionError`.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ConnectionError> {
        let framed = format!("{line}\r\n");
        self.writer.write_all(framed.as_bytes()).await?;
        self.writer.flush().await?;
        self.transcript.sent(line);
        Ok(())
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        self.send_line(&reply.to_string()).await
    }

    /// Reads one line, without its terminator. An orderly peer close or a
    /// socket error surfaces as `ConnectionError`.
    pub async fn recv_line(&mut self) -> Result<String, ConnectionError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(ConnectionError::Closed);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        self.transcript.received(&line);
        Ok(line)
    }

    pub async fn recv_reply(&mut self) -> Result<Reply, FtpError> {
        let line = self.recv_line().await?;
        Reply::parse(&line)
    }
}
