//! Data channel negotiation
//!
//! One negotiator exists per transfer and walks the state machine
//! `Idle -> ModeChosen -> Listening|Connecting -> Established -> Closed`.
//! It owns the transient listening or connecting socket and hands out
//! exactly one `DataConnection`; after that it is spent, and a fresh
//! PASV/PORT/EPSV/EPRT exchange must build a new one. There is no retry
//! anywhere in here: a socket failure surfaces as `DataConnectionError` and
//! the control-channel caller answers with a 425-class reply.
//!
//! Who uses which constructor:
//! - server PASV/EPSV and client PORT/EPRT: [`DataChannelNegotiator::listen`]
//!   (bind now, accept lazily when the transfer asks for the stream);
//! - server PORT/EPRT: [`DataChannelNegotiator::outbound`] (connect lazily);
//! - client PASV/EPSV: [`DataChannelNegotiator::connect`] (connect now,
//!   before the transfer verb is even sent).

use std::net::{IpAddr, SocketAddr};

use log::debug;
use tokio::net::{TcpListener, TcpStream};

use crate::error::DataConnectionError;
use crate::transfer::data::{DataConnection, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Active,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    ModeChosen,
    Listening,
    Connecting,
    Established,
    Closed,
}

pub struct DataChannelNegotiator {
    state: NegotiationState,
    mode: TransferMode,
    listener: Option<TcpListener>,
    peer: Option<SocketAddr>,
    ready: Option<TcpStream>,
}

impl DataChannelNegotiator {
    /// Binds an ephemeral listening socket on `ip` and waits to be asked for
    /// the connected stream. The local address is what gets advertised in
    /// the PASV/EPSV reply (or PORT/EPRT command).
    pub async fn listen(ip: IpAddr, mode: TransferMode) -> Result<Self, DataConnectionError> {
        let listener = TcpListener::bind((ip, 0)).await?;
        debug!("data listener bound at {}", listener.local_addr()?);
        Ok(Self {
            state: NegotiationState::Listening,
            mode,
            listener: Some(listener),
            peer: None,
            ready: None,
        })
    }

    /// Remembers the peer's advertised address; the outgoing connection is
    /// opened only when the transfer needs the stream.
    pub fn outbound(peer: SocketAddr, mode: TransferMode) -> Self {
        Self {
            state: NegotiationState::Connecting,
            mode,
            listener: None,
            peer: Some(peer),
            ready: None,
        }
    }

    /// Connects to `peer` immediately (client passive path: the connection
    /// must exist before the transfer verb is sent, otherwise a server that
    /// blocks in accept before replying would deadlock the exchange).
    pub async fn connect(peer: SocketAddr, mode: TransferMode) -> Result<Self, DataConnectionError> {
        let stream = TcpStream::connect(peer).await?;
        Ok(Self {
            state: NegotiationState::Established,
            mode,
            listener: None,
            peer: Some(peer),
            ready: Some(stream),
        })
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// The address of the transient listening socket, for encoding into a
    /// PASV/EPSV reply or PORT/EPRT command.
    pub fn local_addr(&self) -> Result<SocketAddr, DataConnectionError> {
        match &self.listener {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(DataConnectionError::NotNegotiated),
        }
    }

    /// Produces the one `DataConnection` this negotiation is good for,
    /// accepting or connecting as the mode requires. A second call fails
    /// with `AlreadyUsed`; nothing is ever reused across transfers.
    pub async fn establish(
        &mut self,
        direction: Direction,
    ) -> Result<DataConnection, DataConnectionError> {
        match self.state {
            NegotiationState::Established if self.ready.is_some() => {
                let stream = self.ready.take().expect("checked above");
                Ok(DataConnection::new(stream, direction))
            }
            NegotiationState::Listening => {
                let listener = self.listener.take().ok_or(DataConnectionError::AlreadyUsed)?;
                let (stream, peer) = listener.accept().await?;
                debug!("data connection accepted from {peer}");
                self.state = NegotiationState::Established;
                Ok(DataConnection::new(stream, direction))
            }
            NegotiationState::Connecting => {
                let peer = self.peer.take().ok_or(DataConnectionError::AlreadyUsed)?;
                let stream = TcpStream::connect(peer).await?;
                debug!("data connection opened to {peer}");
                self.state = NegotiationState::Established;
                Ok(DataConnection::new(stream, direction))
            }
            NegotiationState::Idle | NegotiationState::ModeChosen => {
                Err(DataConnectionError::NotNegotiated)
            }
            NegotiationState::Established | NegotiationState::Closed => {
                Err(DataConnectionError::AlreadyUsed)
            }
        }
    }

    /// Marks the negotiation spent once the transfer has completed.
    pub fn finish(&mut self) {
        self.state = NegotiationState::Closed;
        self.listener = None;
        self.peer = None;
        self.ready = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn passive_listener_hands_out_one_connection() {
        let mut negotiator = DataChannelNegotiator::listen("127.0.0.1".parse().unwrap(), TransferMode::Passive)
            .await
            .unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Listening);
        let addr = negotiator.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"payload").await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let conn = negotiator.establish(Direction::Receive).await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Established);
        assert_eq!(conn.receive_all().await.unwrap(), b"payload");
        client.await.unwrap();

        // Spent: the same negotiation cannot produce a second connection.
        assert!(matches!(
            negotiator.establish(Direction::Receive).await,
            Err(DataConnectionError::AlreadyUsed)
        ));
        negotiator.finish();
        assert_eq!(negotiator.state(), NegotiationState::Closed);
        assert!(matches!(
            negotiator.establish(Direction::Receive).await,
            Err(DataConnectionError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn outbound_connects_lazily() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let mut negotiator = DataChannelNegotiator::outbound(addr, TransferMode::Active);
        assert_eq!(negotiator.state(), NegotiationState::Connecting);
        let conn = negotiator.establish(Direction::Send).await.unwrap();
        conn.send_all(b"active bytes").await.unwrap();
        assert_eq!(peer.await.unwrap(), b"active bytes");
    }

    #[tokio::test]
    async fn direction_tag_is_enforced() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = tokio::spawn(async move { listener.accept().await.unwrap() });

        let mut negotiator = DataChannelNegotiator::connect(addr, TransferMode::Passive)
            .await
            .unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Established);
        let conn = negotiator.establish(Direction::Receive).await.unwrap();
        assert!(matches!(
            conn.send_all(b"nope").await,
            Err(DataConnectionError::WrongDirection)
        ));
        drop(accepted.await.unwrap());
    }
}
