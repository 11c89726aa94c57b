//! Data connection
//!
//! A single-use, direction-tagged byte stream bound to exactly one transfer.
//! Both operations consume the connection: closing the socket is the
//! protocol's end-of-transfer signal, and it must happen before the 226
//! completion reply goes out on the control channel. Taking `self` by value
//! makes both properties hold by construction.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::DataConnectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

pub struct DataConnection {
    stream: TcpStream,
    direction: Direction,
}

impl DataConnection {
    pub fn new(stream: TcpStream, direction: Direction) -> Self {
        Self { stream, direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Writes all bytes, then shuts the socket down so the peer sees EOF.
    pub async fn send_all(mut self, bytes: &[u8]) -> Result<(), DataConnectionError> {
        if self.direction != Direction::Send {
            return Err(DataConnectionError::WrongDirection);
        }
        self.stream.write_all(bytes).await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Reads until the peer closes its end, then drops the socket.
    pub async fn receive_all(mut self) -> Result<Vec<u8>, DataConnectionError> {
        if self.direction != Direction::Receive {
            return Err(DataConnectionError::WrongDirection);
        }
        let mut bytes = Vec::new();
        self.stream.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}
