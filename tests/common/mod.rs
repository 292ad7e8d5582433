//! Shared test harness: a scripted loopback IRC server.

#![allow(dead_code)] // each integration test binary uses a subset

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the test tracing subscriber once; `RUST_LOG` filters as usual.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A loopback listener standing in for an IRC server.
pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    /// Bind on an ephemeral loopback port.
    pub async fn bind() -> (FakeServer, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        (FakeServer { listener }, addr)
    }

    /// Accept the session's connection.
    pub async fn accept(self) -> Peer {
        let (stream, _) = timeout(STEP_TIMEOUT, self.listener.accept())
            .await
            .expect("accept timed out")
            .expect("accept failed");
        let (read, write) = stream.into_split();
        Peer {
            reader: BufReader::new(read),
            writer: write,
        }
    }
}

/// The server side of one accepted connection.
pub struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    /// Send one wire line (terminator appended).
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("peer write");
    }

    /// Receive one line, stripped of its terminator.
    pub async fn recv(&mut self) -> String {
        let mut buf = String::new();
        let n = timeout(STEP_TIMEOUT, self.reader.read_line(&mut buf))
            .await
            .expect("read timed out")
            .expect("peer read");
        assert!(n > 0, "session closed the connection unexpectedly");
        buf.trim_end().to_owned()
    }

    /// Receive one line, or `None` if nothing arrives within `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<String> {
        let mut buf = String::new();
        match timeout(wait, self.reader.read_line(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => Some(buf.trim_end().to_owned()),
            _ => None,
        }
    }

    /// Skip lines until one starts with `prefix`; returns it.
    pub async fn expect(&mut self, prefix: &str) -> String {
        loop {
            let line = self.recv().await;
            if line.starts_with(prefix) {
                return line;
            }
        }
    }

    /// Send the registration burst: welcome, your-host, end-of-MOTD.
    pub async fn welcome(&mut self, nick: &str) {
        self.send(&format!(":test.server 001 {nick} :Welcome to the test network"))
            .await;
        self.send(&format!(
            ":test.server 002 {nick} :Your host is test.server, running version TestIRCd-1.0"
        ))
        .await;
        self.send(&format!(":test.server 376 {nick} :End of /MOTD command."))
            .await;
    }
}

/// Poll a condition until it holds or a generous deadline passes.
pub async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}
