//! ferroftp
//!
//! A minimal FTP engine: an interactive client and a concurrent server built
//! on one shared protocol core. The core knows commands, replies, and the
//! packed address codec; `channel` carries control lines, `transfer` handles
//! the single-use data connections, and the `server`/`client` modules put
//! the pieces together for each role.

pub mod auth;
pub mod channel;
pub mod client;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use client::CommandSequencer;
pub use server::{Server, ServerConfig};
