//! FTP protocol model
//!
//! Pure data: command parsing, reply parsing and classification, and the
//! packed address codec. No sockets live in this module.

pub mod addr;
pub mod command;
pub mod reply;

pub use addr::{PackedAddress, decode, encode_extended, encode_packed};
pub use command::{Command, parse_command};
pub use reply::Reply;
