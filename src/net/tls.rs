use std::convert::TryFrom;
use std::io;
use std::net::TcpStream;
use std::sync::Arc;

use log::debug;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// default_client_config trusts Mozilla root store shipped with webpki-roots.
pub fn default_client_config() -> Arc<ClientConfig> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}

/// handshake runs TLS client handshake over already connected socket.
/// `host` is used both for SNI and certificate verification.
pub fn handshake(config: Arc<ClientConfig>, host: &str, mut tcp: TcpStream) -> io::Result<TlsStream> {
    let name = ServerName::try_from(host.to_string())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut conn = ClientConnection::new(config, name)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)?;
    }
    debug!(
        "TLS established with {} ({:?})",
        host,
        conn.protocol_version()
    );
    Ok(StreamOwned::new(conn, tcp))
}
