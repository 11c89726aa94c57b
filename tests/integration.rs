//! End-to-end tests: a real server on an ephemeral port, driven by the
//! client sequencer or by raw control-channel lines.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use ferroftp::auth::Credentials;
use ferroftp::client::CommandSequencer;
use ferroftp::error::FtpError;
use ferroftp::logging::TranscriptLogger;
use ferroftp::server::{Server, ServerConfig};

fn scratch_root() -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let root = std::env::temp_dir().join(format!(
        "ferroftp-it-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(root.join("pub")).unwrap();
    std::fs::write(root.join("hello.txt"), b"hello from the server\n").unwrap();
    std::fs::write(root.join("pub/inner.txt"), b"inner").unwrap();
    root
}

async fn start_server(root: &PathBuf, max_clients: usize) -> SocketAddr {
    let config = ServerConfig {
        bind_address: "127.0.0.1".to_string(),
        control_port: 0,
        server_root: root.to_string_lossy().into_owned(),
        max_clients,
        max_command_length: 512,
        credentials_file: None,
        transcript_log: None,
    };
    let credentials = Credentials::from_pairs([("alice", "alice123"), ("bob", "bob123")]);
    let server = Server::bind(config, credentials, TranscriptLogger::disabled())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn login(addr: SocketAddr) -> CommandSequencer {
    let mut sequencer =
        CommandSequencer::connect(&addr.ip().to_string(), addr.port(), TranscriptLogger::disabled())
            .await
            .unwrap();
    sequencer.login("alice", "alice123").await.unwrap();
    sequencer
}

/// A raw control connection for exercising the wire protocol directly.
struct RawClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl RawClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        };
        let greeting = client.recv().await;
        assert!(greeting.starts_with("220"), "greeting was {greeting:?}");
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "server closed the connection");
        line.trim_end().to_string()
    }

    async fn exchange(&mut self, line: &str) -> String {
        self.send(line).await;
        self.recv().await
    }
}

#[tokio::test]
async fn login_rejected_then_accepted() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut bad =
        CommandSequencer::connect(&addr.ip().to_string(), addr.port(), TranscriptLogger::disabled())
            .await
            .unwrap();
    match bad.login("alice", "wrongpass").await {
        Err(FtpError::AuthenticationFailed(reply)) => assert!(reply.starts_with("530")),
        other => panic!("expected authentication failure, got {other:?}"),
    }

    let mut good = login(addr).await;
    good.quit().await.unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn commands_require_login() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut raw = RawClient::connect(addr).await;
    assert!(raw.exchange("PWD").await.starts_with("530"));
    assert!(raw.exchange("PASV").await.starts_with("530"));
    assert!(raw.exchange("RETR hello.txt").await.starts_with("530"));
    // PASS before USER is a sequence error, not an auth failure.
    assert!(raw.exchange("PASS alice123").await.starts_with("503"));
    assert!(raw.exchange("QUIT").await.starts_with("221"));
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn passive_list_and_directory_navigation() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;
    let mut client = login(addr).await;

    let listing = client.list(None).await.unwrap();
    assert!(listing.contains("hello.txt"), "listing was {listing:?}");
    assert!(listing.contains("pub"));

    // LIST with a path does not move the working directory.
    let sub = client.list(Some("pub")).await.unwrap();
    assert!(sub.contains("inner.txt"));
    assert!(client.pwd().await.unwrap().contains("\"/\""));

    client.cwd("pub").await.unwrap();
    assert!(client.pwd().await.unwrap().contains("\"/pub\""));
    let inner = client.list(None).await.unwrap();
    assert!(inner.contains("inner.txt"));

    // Climbing above the root clamps there.
    client.cwd("../../..").await.unwrap();
    assert!(client.pwd().await.unwrap().contains("\"/\""));

    assert!(client.cwd("no-such-dir").await.is_err());
    client.quit().await.unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn stor_then_retr_preserves_contents() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;
    let mut client = login(addr).await;

    // Empty transfer: close-is-EOF with zero bytes in between.
    client.store("empty.bin", b"").await.unwrap();
    assert_eq!(client.retrieve("empty.bin").await.unwrap(), b"");

    // Larger than any single read buffer.
    let big: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 251) as u8).collect();
    client.store("big.bin", &big).await.unwrap();
    assert_eq!(client.retrieve("big.bin").await.unwrap(), big);
    assert_eq!(std::fs::read(root.join("big.bin")).unwrap(), big);

    // Uploads land in the session's working directory.
    client.cwd("pub").await.unwrap();
    client.store("nested.txt", b"nested").await.unwrap();
    assert_eq!(std::fs::read(root.join("pub/nested.txt")).unwrap(), b"nested");

    client.quit().await.unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn retr_of_missing_file_is_survivable() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;
    let mut client = login(addr).await;

    match client.retrieve("no-such-file.txt").await {
        Err(FtpError::Protocol(reply)) => assert!(reply.contains("550"), "reply was {reply:?}"),
        other => panic!("expected a 550-class failure, got {other:?}"),
    }
    // The control connection survives the refused transfer.
    assert_eq!(client.retrieve("hello.txt").await.unwrap(), b"hello from the server\n");
    client.quit().await.unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn transfer_without_negotiation_draws_425() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut raw = RawClient::connect(addr).await;
    assert!(raw.exchange("USER alice").await.starts_with("331"));
    assert!(raw.exchange("PASS alice123").await.starts_with("230"));
    assert!(raw.exchange("RETR hello.txt").await.starts_with("425"));
    assert!(raw.exchange("LIST").await.starts_with("425"));

    // A negotiation is consumed by exactly one transfer command.
    let reply = raw.exchange("PASV").await;
    assert!(reply.starts_with("227"), "reply was {reply:?}");
    let packed = ferroftp::protocol::decode(&reply).unwrap();
    let mut data = TcpStream::connect((packed.ip.unwrap(), packed.port))
        .await
        .unwrap();
    assert!(raw.exchange("RETR hello.txt").await.starts_with("150"));
    let mut bytes = Vec::new();
    data.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes, b"hello from the server\n");
    assert!(raw.recv().await.starts_with("226"));
    assert!(raw.exchange("RETR hello.txt").await.starts_with("425"));
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn malformed_port_payload_draws_501() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut raw = RawClient::connect(addr).await;
    assert!(raw.exchange("USER alice").await.starts_with("331"));
    assert!(raw.exchange("PASS alice123").await.starts_with("230"));
    assert!(raw.exchange("PORT 1,2,3,4,5").await.starts_with("501"));
    assert!(raw.exchange("PORT 1,2,3,4,999,1").await.starts_with("501"));
    assert!(raw.exchange("EPRT |9|1.2.3.4|80|").await.starts_with("501"));
    assert!(raw.exchange("STOR x").await.starts_with("425"));
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn oversized_command_line_draws_500() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut raw = RawClient::connect(addr).await;
    let long = format!("RETR {}", "a".repeat(600));
    assert!(raw.exchange(&long).await.starts_with("500"));
    // The session is still usable afterwards.
    assert!(raw.exchange("USER alice").await.starts_with("331"));
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn active_mode_round_trip() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;
    let mut client = login(addr).await;

    assert!(!client.toggle_passive());
    client.store("active.bin", b"sent over an active channel").await.unwrap();
    assert_eq!(
        client.retrieve("active.bin").await.unwrap(),
        b"sent over an active channel"
    );
    let listing = client.list(None).await.unwrap();
    assert!(listing.contains("active.bin"));
    client.quit().await.unwrap();
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn epsv_is_decoded_like_pasv() {
    let root = scratch_root();
    let addr = start_server(&root, 4).await;

    let mut raw = RawClient::connect(addr).await;
    assert!(raw.exchange("USER alice").await.starts_with("331"));
    assert!(raw.exchange("PASS alice123").await.starts_with("230"));
    let reply = raw.exchange("EPSV").await;
    assert!(reply.starts_with("229"), "reply was {reply:?}");
    let packed = ferroftp::protocol::decode(&reply).unwrap();
    assert!(packed.ip.is_none());

    let mut data = TcpStream::connect((addr.ip(), packed.port)).await.unwrap();
    raw.send("STOR epsv.bin").await;
    assert!(raw.recv().await.starts_with("150"));
    data.write_all(b"extended").await.unwrap();
    data.shutdown().await.unwrap();
    assert!(raw.recv().await.starts_with("226"));
    assert_eq!(std::fs::read(root.join("epsv.bin")).unwrap(), b"extended");
    std::fs::remove_dir_all(root).unwrap();
}

#[tokio::test]
async fn connection_cap_turns_extra_clients_away() {
    let root = scratch_root();
    let addr = start_server(&root, 1).await;

    // The first client occupies the only slot (the 220 greeting proves the
    // server has counted it in).
    let first = RawClient::connect(addr).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, _write_half) = stream.into_split();
    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await.unwrap();
    assert!(line.starts_with("421"), "greeting was {line:?}");

    drop(first);
    std::fs::remove_dir_all(root).unwrap();
}
