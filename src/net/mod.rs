//! Byte streams used by protocol sessions.
//!
//! Sessions never open sockets themselves. They ask a `Connector` for a stream and for its
//! in-place TLS upgrade, which lets tests replace the network with a scripted conversation.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use rustls::ClientConfig;

pub use line::*;
pub use tls::{default_client_config, TlsStream};

mod line;
mod tls;
#[cfg(test)]
pub(crate) mod mock;

pub trait Connector {
    type Stream: Read + Write;

    /// connect opens plain stream. Connecting and every later read and write are bounded by `timeout`.
    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Stream>;

    /// start_tls performs TLS handshake on already opened stream.
    fn start_tls(&self, stream: Self::Stream, host: &str) -> io::Result<Self::Stream>;
}

impl<'a, C: Connector + ?Sized> Connector for &'a C {
    type Stream = C::Stream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Stream> {
        (**self).connect(host, port, timeout)
    }

    fn start_tls(&self, stream: Self::Stream, host: &str) -> io::Result<Self::Stream> {
        (**self).start_tls(stream, host)
    }
}

pub enum NetStream {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl NetStream {
    pub fn is_tls(&self) -> bool {
        match self {
            NetStream::Plain(_) => false,
            NetStream::Tls(_) => true,
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(s) => s.read(buf),
            NetStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(s) => s.write(buf),
            NetStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetStream::Plain(s) => s.flush(),
            NetStream::Tls(s) => s.flush(),
        }
    }
}

/// TcpConnector connects over TCP and upgrades with rustls.
#[derive(Clone)]
pub struct TcpConnector {
    tls_config: Arc<ClientConfig>,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::with_tls_config(default_client_config())
    }

    pub fn with_tls_config(tls_config: Arc<ClientConfig>) -> Self {
        Self { tls_config }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    type Stream = NetStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<NetStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            debug!("connecting to {}", addr);
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(s) => {
                    s.set_read_timeout(Some(timeout))?;
                    s.set_write_timeout(Some(timeout))?;
                    return Ok(NetStream::Plain(s));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} did not resolve to any address", host))
        }))
    }

    fn start_tls(&self, stream: NetStream, host: &str) -> io::Result<NetStream> {
        match stream {
            NetStream::Plain(tcp) => {
                let tls = tls::handshake(self.tls_config.clone(), host, tcp)?;
                Ok(NetStream::Tls(Box::new(tls)))
            }
            NetStream::Tls(_) => Err(io::Error::new(io::ErrorKind::Other, "stream is already encrypted")),
        }
    }
}
