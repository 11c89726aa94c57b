//! Server side: acceptor, per-session workers, and the command table.

pub mod config;
pub mod core;
pub mod dispatcher;
pub mod session;

pub use config::ServerConfig;
pub use core::Server;
pub use session::Session;
