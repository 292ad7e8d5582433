//! Client transport: plaintext or TLS over one TCP connection.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;

/// A unified stream type for server connections.
///
/// Wraps plaintext and TLS-encrypted streams so the protocol layer stays
/// agnostic to transport security.
pub enum Transport {
    /// Plaintext TCP connection.
    Plain(TcpStream),
    /// TLS-encrypted connection.
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Returns true if this is a TLS-encrypted connection.
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Open the configured connection: optional local bind, TCP connect,
    /// optional TLS upgrade against the system root store.
    pub async fn connect(config: &SessionConfig) -> Result<Transport, SessionError> {
        let target = format!("{}:{}", config.server, config.port);
        let stream = match config.local_bind {
            None => TcpStream::connect(&target)
                .await
                .map_err(SessionError::Connect)?,
            Some(local) => connect_from(&target, local).await?,
        };
        debug!(server = %target, tls = config.tls, "socket opened");

        if !config.tls {
            return Ok(Transport::Plain(stream));
        }

        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            if let Err(e) = roots.add(cert) {
                warn!(error = %e, "failed to add root cert");
            }
        }
        for e in &native.errors {
            warn!(error = %e, "error loading native certs");
        }

        let tls_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = ServerName::try_from(config.server.clone())
            .map_err(|_| SessionError::ServerName(config.server.clone()))?;
        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(SessionError::Connect)?;
        debug!(server = %config.server, "TLS handshake completed");
        Ok(Transport::Tls(Box::new(tls_stream)))
    }
}

/// Connect to `target` with the local side bound to `local`.
async fn connect_from(target: &str, local: std::net::IpAddr) -> Result<TcpStream, SessionError> {
    let mut last_err: Option<io::Error> = None;
    let addrs = tokio::net::lookup_host(target)
        .await
        .map_err(SessionError::Connect)?;
    for addr in addrs {
        if addr.is_ipv4() != local.is_ipv4() {
            continue;
        }
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(SessionError::Connect)?;
        if let Err(e) = socket.bind(SocketAddr::new(local, 0)) {
            last_err = Some(e);
            continue;
        }
        match socket.connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(SessionError::Connect(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no usable address for local bind",
        )
    })))
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
