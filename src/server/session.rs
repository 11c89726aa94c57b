//! Per-connection session state
//!
//! One `Session` exists per accepted control connection, owned exclusively
//! by the task driving that connection, and dies with it. The pending data
//! negotiation is the "arena of one": the most recent PASV/PORT/EPSV/EPRT
//! exchange parks a negotiator here, and the next transfer command takes it
//! out. At most one pending intent exists at a time; a new exchange simply
//! replaces the old one.

use std::net::SocketAddr;

use log::debug;

use crate::storage::Storage;
use crate::transfer::DataChannelNegotiator;

pub struct Session {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    username: Option<String>,
    authenticated: bool,
    storage: Box<dyn Storage>,
    pending_data: Option<DataChannelNegotiator>,
}

impl Session {
    pub fn new(peer_addr: SocketAddr, local_addr: SocketAddr, storage: Box<dyn Storage>) -> Self {
        Self {
            peer_addr,
            local_addr,
            username: None,
            authenticated: false,
            storage,
            pending_data: None,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// USER resets any previous login; PASS must follow to authenticate.
    pub fn set_username(&mut self, username: &str) {
        self.username = Some(username.to_string());
        self.authenticated = false;
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    pub fn storage_mut(&mut self) -> &mut dyn Storage {
        self.storage.as_mut()
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Parks the outcome of a mode-setup exchange, replacing any earlier
    /// unconsumed one.
    pub fn set_pending_data(&mut self, negotiator: DataChannelNegotiator) {
        if self.pending_data.is_some() {
            debug!(
                "client {} renegotiated data channel before using it",
                self.peer_addr
            );
        }
        self.pending_data = Some(negotiator);
    }

    /// Consumes the pending negotiation; the caller owns it for exactly one
    /// transfer.
    pub fn take_pending_data(&mut self) -> Option<DataChannelNegotiator> {
        self.pending_data.take()
    }
}
