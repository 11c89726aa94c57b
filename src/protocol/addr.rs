//! Packed address codec
//!
//! Encoding and decoding of the address-and-port tuples FTP smuggles through
//! reply text and command arguments: the classic 6-number
//! `h1,h2,h3,h4,p1,p2` form (PASV replies, PORT arguments) and the extended
//! `|proto|addr|port|` / `|||port|` forms (EPRT arguments, EPSV replies).
//! Pure parsing and formatting; no sockets are touched here.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::MalformedAddress;

/// Decoded form of a PASV/PORT/EPSV/EPRT payload.
///
/// `ip` is `None` for the port-only extended form, where the peer's
/// already-known address is reused by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedAddress {
    pub ip: Option<IpAddr>,
    pub port: u16,
}

/// Encodes an IPv4 address and port as `h1,h2,h3,h4,p1,p2` where
/// `p1 = port / 256` and `p2 = port % 256`.
pub fn encode_packed(ip: IpAddr, port: u16) -> Result<String, MalformedAddress> {
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => {
            return Err(MalformedAddress(format!(
                "cannot pack non-IPv4 address {ip} into h1,h2,h3,h4,p1,p2 form"
            )));
        }
    };
    let [h1, h2, h3, h4] = v4.octets();
    Ok(format!(
        "{},{},{},{},{},{}",
        h1,
        h2,
        h3,
        h4,
        port / 256,
        port % 256
    ))
}

/// Encodes a port in the extended passive form used inside EPSV replies.
pub fn encode_extended(port: u16) -> String {
    format!("|||{port}|")
}

/// Decodes any of the payload shapes the protocol produces:
///
/// - a reply line carrying `(|||port|)` (EPSV),
/// - a reply line carrying `(h1,h2,h3,h4,p1,p2)` (PASV),
/// - a bare `h1,h2,h3,h4,p1,p2` tuple (PORT argument),
/// - a `|proto|addr|port|` triple or port-only `|||port|` (EPRT argument).
///
/// The bracketed forms extract the substring between the first `(` and the
/// first `)`; everything outside is ignored.
pub fn decode(payload: &str) -> Result<PackedAddress, MalformedAddress> {
    if let (Some(start), Some(end)) = (payload.find("(|||"), payload.find("|)")) {
        if end <= start {
            return Err(MalformedAddress(payload.to_string()));
        }
        let port = parse_port(&payload[start + 4..end], payload)?;
        return Ok(PackedAddress { ip: None, port });
    }

    if let Some(start) = payload.find('(') {
        let end = payload
            .find(')')
            .ok_or_else(|| MalformedAddress(payload.to_string()))?;
        if end <= start {
            return Err(MalformedAddress(payload.to_string()));
        }
        return decode_tuple(&payload[start + 1..end], payload);
    }

    let trimmed = payload.trim();
    if trimmed.starts_with('|') {
        return decode_extended(trimmed);
    }
    decode_tuple(trimmed, payload)
}

/// Decodes the comma-separated 6-number tuple into an IPv4 address and port.
fn decode_tuple(inner: &str, payload: &str) -> Result<PackedAddress, MalformedAddress> {
    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(MalformedAddress(format!(
            "expected 6 comma-separated fields, got {}: {payload}",
            fields.len()
        )));
    }
    let mut octets = [0u8; 6];
    for (i, field) in fields.iter().enumerate() {
        octets[i] = field
            .parse::<u8>()
            .map_err(|_| MalformedAddress(format!("non-numeric field {field:?}: {payload}")))?;
    }
    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
    Ok(PackedAddress {
        ip: Some(IpAddr::V4(ip)),
        port,
    })
}

/// Decodes the `|proto|addr|port|` EPRT form. An empty proto and addr
/// (`|||port|`) yields a port-only address.
fn decode_extended(inner: &str) -> Result<PackedAddress, MalformedAddress> {
    let parts: Vec<&str> = inner.split('|').collect();
    // Leading and trailing delimiters produce empty first/last parts.
    if parts.len() < 3 || !parts.first().is_some_and(|p| p.is_empty()) {
        return Err(MalformedAddress(inner.to_string()));
    }
    let fields: Vec<&str> = parts[1..parts.len() - 1].to_vec();
    match fields.as_slice() {
        ["", "", port] => Ok(PackedAddress {
            ip: None,
            port: parse_port(port, inner)?,
        }),
        [proto, addr, port] => {
            let ip: IpAddr = addr
                .parse()
                .map_err(|_| MalformedAddress(format!("bad address {addr:?}: {inner}")))?;
            match (*proto, ip) {
                ("1", IpAddr::V4(_)) | ("2", IpAddr::V6(_)) => {}
                _ => {
                    return Err(MalformedAddress(format!(
                        "protocol {proto:?} does not match address {addr:?}: {inner}"
                    )));
                }
            }
            Ok(PackedAddress {
                ip: Some(ip),
                port: parse_port(port, inner)?,
            })
        }
        _ => Err(MalformedAddress(inner.to_string())),
    }
}

fn parse_port(field: &str, payload: &str) -> Result<u16, MalformedAddress> {
    let value: u32 = field
        .trim()
        .parse()
        .map_err(|_| MalformedAddress(format!("non-numeric port {field:?}: {payload}")))?;
    u16::try_from(value)
        .map_err(|_| MalformedAddress(format!("port {value} out of range: {payload}")))
}
