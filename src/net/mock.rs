//! Scripted in-memory connector for session tests.

use std::cell::{Cell, RefCell};
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;
use std::time::Duration;

use super::Connector;

pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    transcript: Rc<RefCell<Vec<u8>>>,
    pub tls: bool,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.transcript.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// ScriptedConnector replays server side of conversation.
///
/// `plain` is everything server sends before TLS upgrade, `tls` everything after it.
/// All bytes written by client land in shared transcript.
pub(crate) struct ScriptedConnector {
    plain: RefCell<Option<Vec<u8>>>,
    tls: RefCell<Option<Vec<u8>>>,
    transcript: Rc<RefCell<Vec<u8>>>,
    refuse: bool,
    pub upgrades: Cell<usize>,
    pub connected_to: RefCell<Option<(String, u16, Duration)>>,
}

impl ScriptedConnector {
    pub fn new(plain: &str) -> Self {
        Self {
            plain: RefCell::new(Some(plain.as_bytes().to_vec())),
            tls: RefCell::new(None),
            transcript: Rc::new(RefCell::new(Vec::new())),
            refuse: false,
            upgrades: Cell::new(0),
            connected_to: RefCell::new(None),
        }
    }

    pub fn with_tls(self, tls: &str) -> Self {
        *self.tls.borrow_mut() = Some(tls.as_bytes().to_vec());
        self
    }

    pub fn with_bytes(plain: &[u8]) -> Self {
        let c = Self::new("");
        *c.plain.borrow_mut() = Some(plain.to_vec());
        c
    }

    pub fn refusing() -> Self {
        let mut c = Self::new("");
        c.refuse = true;
        c
    }

    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.transcript.borrow()).into_owned()
    }
}

impl Connector for ScriptedConnector {
    type Stream = ScriptedStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<ScriptedStream> {
        *self.connected_to.borrow_mut() = Some((host.to_string(), port, timeout));
        if self.refuse {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        let input = self.plain.borrow_mut().take().unwrap_or_default();
        Ok(ScriptedStream {
            input: Cursor::new(input),
            transcript: self.transcript.clone(),
            tls: false,
        })
    }

    fn start_tls(&self, stream: ScriptedStream, _host: &str) -> io::Result<ScriptedStream> {
        if stream.tls {
            return Err(io::Error::new(io::ErrorKind::Other, "stream is already encrypted"));
        }
        let input = match self.tls.borrow_mut().take() {
            Some(i) => i,
            None => return Err(io::Error::new(io::ErrorKind::InvalidData, "handshake failed")),
        };
        self.upgrades.set(self.upgrades.get() + 1);
        Ok(ScriptedStream {
            input: Cursor::new(input),
            transcript: stream.transcript,
            tls: true,
        })
    }
}
