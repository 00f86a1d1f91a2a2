use std::io;

use log::{debug, info, warn};

use crate::config::{SecurityMode, TransportConfig};
use crate::error::{ConfigError, TransportError, TransportResult};
use crate::imap::command::{Command, TagGenerator};
use crate::imap::fetch::parse_fetch_items;
use crate::imap::response::{Response, ResponseError, Status, Untagged};
use crate::net::{Connector, LineChannel};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ImapState {
    Disconnected,
    Connected,
    TlsUpgraded,
    Authenticated,
    FolderSelected,
}

/// FetchedMessage is raw message as stored on server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub sequence: u32,
    pub uid: Option<u32>,
    pub raw: Vec<u8>,
}

/// Completion is result of tagged command with untagged responses received while it ran.
#[derive(Debug, Clone)]
pub struct Completion {
    pub tag: String,
    pub status: Status,
    pub text: String,
    pub untagged: Vec<Untagged>,
}

/// ImapSession drives single IMAP connection:
/// `connect`, `negotiate_tls`, `login`, `select_folder`, `fetch_messages`, `logout`.
///
/// Command completes only on tagged response with its own tag. Stream failures and timeouts
/// drop connection and are reported as connection errors.
pub struct ImapSession<C: Connector> {
    config: TransportConfig,
    connector: C,
    channel: Option<LineChannel<C::Stream>>,
    state: ImapState,
    tags: TagGenerator,
    selected: Option<String>,
    exists: Option<u32>,
}

impl<C: Connector> ImapSession<C> {
    pub fn new(config: TransportConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            channel: None,
            state: ImapState::Disconnected,
            tags: TagGenerator::default(),
            selected: None,
            exists: None,
        }
    }

    pub fn state(&self) -> ImapState {
        self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// message_count is number of messages reported by `EXISTS` for selected folder.
    pub fn message_count(&self) -> Option<u32> {
        self.exists
    }

    pub fn selected_folder(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    fn host(&self) -> &str {
        self.config.host()
    }

    fn drop_connection(&mut self) {
        self.channel = None;
        self.state = ImapState::Disconnected;
        self.selected = None;
        self.exists = None;
    }

    fn io_failure(&mut self, e: io::Error) -> TransportError {
        warn!("connection to {} lost: {}", self.host(), e);
        self.drop_connection();
        TransportError::connection(self.config.host(), e)
    }

    fn response_failure(&mut self, command: &str, e: ResponseError) -> TransportError {
        match e {
            ResponseError::Io(e) => self.io_failure(e),
            e => {
                self.drop_connection();
                TransportError::protocol(self.config.host(), command, "-", &e.to_string())
            }
        }
    }

    fn require_state(&self, command: &str, allowed: &[ImapState]) -> TransportResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TransportError::protocol(
                self.host(),
                command,
                "-",
                &format!("not allowed in state {:?}", self.state),
            ))
        }
    }

    fn read_response(&mut self, command: &str) -> TransportResult<Response> {
        let res = match self.channel.as_mut() {
            Some(c) => Response::read(c),
            None => return Err(TransportError::connection(self.config.host(), "not connected")),
        };
        match res {
            Ok(r) => Ok(r),
            Err(e) => Err(self.response_failure(command, e)),
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> TransportResult<()> {
        let res = match self.channel.as_mut() {
            Some(c) => c.write_all(data),
            None => return Err(TransportError::connection(self.config.host(), "not connected")),
        };
        res.map_err(|e| self.io_failure(e))
    }

    /// run sends tagged command and collects responses until its completion.
    fn run(&mut self, command: &Command) -> TransportResult<Completion> {
        let tag = self.tags.next_tag();
        let label = format!("{} {}", tag, command);
        debug!("C: {}", label);

        let chunks = command.encode(&tag);
        let mut untagged = Vec::new();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            self.send_raw(chunk)?;
            if i == last {
                break;
            }
            // literal announced, server has to agree before payload is sent
            loop {
                match self.read_response(&label)? {
                    Response::Continuation(_) => break,
                    Response::Untagged(u) => untagged.push(u),
                    Response::Tagged { tag: t, status, text } if t == tag => {
                        return Ok(Completion { tag, status, text, untagged });
                    }
                    Response::Tagged { tag: t, status, text } => {
                        return Err(self.mismatched_tag(&label, &t, status, &text));
                    }
                }
            }
        }

        loop {
            match self.read_response(&label)? {
                Response::Untagged(u) => untagged.push(u),
                Response::Tagged { tag: t, status, text } if t == tag => {
                    debug!("S: {} {} {}", t, status.as_str(), text);
                    return Ok(Completion { tag, status, text, untagged });
                }
                Response::Tagged { tag: t, status, text } => {
                    return Err(self.mismatched_tag(&label, &t, status, &text));
                }
                Response::Continuation(text) => {
                    self.drop_connection();
                    return Err(TransportError::protocol(self.host(), &label, "+", &text));
                }
            }
        }
    }

    fn mismatched_tag(&mut self, label: &str, tag: &str, status: Status, text: &str) -> TransportError {
        self.drop_connection();
        TransportError::protocol(
            self.host(),
            label,
            status.as_str(),
            &format!("completion for unknown tag {}: {}", tag, text),
        )
    }

    fn failed(&self, command: &Command, completion: &Completion) -> TransportError {
        TransportError::protocol(
            self.host(),
            &format!("{} {}", completion.tag, command),
            completion.status.as_str(),
            &completion.text,
        )
    }

    /// connect opens connection and reads greeting. `* PREAUTH` greeting skips login.
    pub fn connect(&mut self) -> TransportResult<()> {
        self.require_state("connect", &[ImapState::Disconnected])?;
        let host = self.config.host().to_string();
        let port = self.config.port();
        info!("connecting to IMAP server {}:{} ({:?})", host, port, self.config.security());

        let mut stream = self.connector
            .connect(&host, port, self.config.timeout())
            .map_err(|e| TransportError::connection(&host, e))?;
        let implicit = self.config.security() == SecurityMode::ImplicitTls;
        if implicit {
            stream = self.connector
                .start_tls(stream, &host)
                .map_err(|e| TransportError::connection(&host, e))?;
        }
        self.channel = Some(LineChannel::new(stream));
        self.state = ImapState::Connected;

        let greeting = match self.channel.as_mut().map(Response::read) {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                self.drop_connection();
                return Err(TransportError::connection(&host, e));
            }
            None => return Err(TransportError::connection(&host, "not connected")),
        };
        match greeting {
            Response::Untagged(ref u) if u.number.is_none() && u.kind == "OK" => {
                self.state = if implicit { ImapState::TlsUpgraded } else { ImapState::Connected };
                info!("connected to {}: {}", host, u.text);
                Ok(())
            }
            Response::Untagged(ref u) if u.number.is_none() && u.kind == "PREAUTH" => {
                self.state = ImapState::Authenticated;
                info!("connected to {}, preauthenticated: {}", host, u.text);
                Ok(())
            }
            other => {
                self.drop_connection();
                let reason = match other {
                    Response::Untagged(u) => format!("greeting {} {}", u.kind, u.text),
                    r => format!("unexpected greeting {:?}", r),
                };
                Err(TransportError::connection(&host, reason))
            }
        }
    }

    /// negotiate_tls upgrades plain connection with tagged `STARTTLS`.
    /// It does nothing unless security mode is `StartTls`.
    pub fn negotiate_tls(&mut self) -> TransportResult<()> {
        if self.config.security() != SecurityMode::StartTls {
            return Ok(());
        }
        self.require_state("STARTTLS", &[ImapState::Connected])?;
        let completion = self.run(&Command::StartTls)?;
        if completion.status != Status::Ok {
            return Err(self.failed(&Command::StartTls, &completion));
        }

        let channel = match self.channel.take() {
            Some(c) => c,
            None => return Err(TransportError::connection(self.config.host(), "not connected")),
        };
        if channel.has_buffered() {
            self.drop_connection();
            return Err(TransportError::protocol(
                self.config.host(),
                "STARTTLS",
                "OK",
                "server sent data before TLS handshake",
            ));
        }
        let host = self.config.host().to_string();
        match self.connector.start_tls(channel.into_inner(), &host) {
            Ok(stream) => {
                self.channel = Some(LineChannel::new(stream));
                self.state = ImapState::TlsUpgraded;
                info!("STARTTLS upgrade with {} done", host);
                Ok(())
            }
            Err(e) => Err(self.io_failure(e)),
        }
    }

    /// login authenticates with configured credentials.
    /// It does nothing when server greeted with `PREAUTH`.
    pub fn login(&mut self) -> TransportResult<()> {
        if self.state == ImapState::Authenticated {
            return Ok(());
        }
        self.require_state("LOGIN", &[ImapState::Connected, ImapState::TlsUpgraded])?;
        if self.config.security() == SecurityMode::StartTls && self.state != ImapState::TlsUpgraded {
            return Err(TransportError::protocol(
                self.host(),
                "LOGIN",
                "-",
                "STARTTLS has to be negotiated first",
            ));
        }
        let credentials = self.config.credentials().cloned().ok_or(ConfigError::MissingCredentials)?;
        let command = Command::Login {
            username: credentials.username.clone(),
            password: credentials.password,
        };
        let completion = self.run(&command)?;
        match completion.status {
            Status::Ok => {
                self.state = ImapState::Authenticated;
                info!("logged in to {} as {}", self.host(), credentials.username);
                Ok(())
            }
            s => Err(TransportError::authentication(self.host(), s.as_str(), &completion.text)),
        }
    }

    /// select_folder opens folder and returns its message count from `EXISTS`.
    pub fn select_folder(&mut self, name: &str) -> TransportResult<u32> {
        self.require_state("SELECT", &[ImapState::Authenticated, ImapState::FolderSelected])?;
        let command = Command::Select(name.to_string());
        let completion = self.run(&command)?;
        if completion.status != Status::Ok {
            // failed SELECT deselects previous folder
            self.state = ImapState::Authenticated;
            self.selected = None;
            self.exists = None;
            return Err(self.failed(&command, &completion));
        }

        let exists = completion.untagged.iter()
            .filter(|u| u.kind == "EXISTS")
            .filter_map(|u| u.number)
            .last();
        let exists = match exists {
            Some(e) => e,
            None => {
                return Err(TransportError::protocol(
                    self.host(),
                    &format!("{} {}", completion.tag, command),
                    "OK",
                    "no EXISTS response",
                ));
            }
        };
        self.state = ImapState::FolderSelected;
        self.selected = Some(name.to_string());
        self.exists = Some(exists);
        info!("selected {} on {}: {} message(s)", name, self.host(), exists);
        Ok(exists)
    }

    /// fetch_messages downloads every message of selected folder without marking it seen.
    pub fn fetch_messages(&mut self) -> TransportResult<Vec<FetchedMessage>> {
        self.require_state("FETCH", &[ImapState::FolderSelected])?;
        let count = self.exists.unwrap_or(0);
        if count == 0 {
            return Ok(Vec::new());
        }
        let command = Command::Fetch { first: 1, last: count };
        let completion = self.run(&command)?;
        let label = format!("{} {}", completion.tag, command);
        if completion.status != Status::Ok {
            return Err(self.failed(&command, &completion));
        }

        let mut res: Vec<FetchedMessage> = Vec::with_capacity(count as usize);
        for u in completion.untagged.iter() {
            match (u.kind.as_str(), u.number) {
                ("FETCH", Some(sequence)) => {
                    let items = parse_fetch_items(&u.text, &u.literals)
                        .map_err(|e| TransportError::protocol(self.host(), &label, "OK", &e.to_string()))?;
                    let raw = match items.body {
                        Some(raw) => raw,
                        None => {
                            debug!("ignoring FETCH {} without message body", sequence);
                            continue;
                        }
                    };
                    if sequence == 0 || sequence > count {
                        return Err(TransportError::protocol(
                            self.host(),
                            &label,
                            "OK",
                            &format!("sequence number {} out of range 1:{}", sequence, count),
                        ));
                    }
                    if let Some(prev) = res.last() {
                        if sequence <= prev.sequence {
                            return Err(TransportError::protocol(
                                self.host(),
                                &label,
                                "OK",
                                &format!("sequence number {} after {}", sequence, prev.sequence),
                            ));
                        }
                    }
                    res.push(FetchedMessage {
                        sequence,
                        uid: items.uid,
                        raw,
                    });
                }
                (kind, _) => debug!("untagged {} while fetching", kind),
            }
        }
        if res.len() != count as usize {
            return Err(TransportError::protocol(
                self.host(),
                &label,
                "OK",
                &format!("got {} of {} messages", res.len(), count),
            ));
        }
        info!("fetched {} message(s) from {}", res.len(), self.host());
        Ok(res)
    }

    /// logout sends `LOGOUT` and closes connection whatever server answers.
    pub fn logout(&mut self) -> TransportResult<()> {
        if self.channel.is_none() {
            self.state = ImapState::Disconnected;
            return Ok(());
        }
        let res = self.run(&Command::Logout);
        self.drop_connection();
        info!("IMAP connection to {} closed", self.host());
        res.map(|_| ())
    }
}

#[cfg(test)]
mod test {
    use crate::config::{Credentials, Protocol};
    use crate::error::ErrorKind;
    use crate::net::mock::ScriptedConnector;

    use super::*;

    fn config(security: SecurityMode) -> TransportConfig {
        TransportConfig::builder(Protocol::Imap, "imap.example.com")
            .security(security)
            .credentials(Credentials::new("user", "pass"))
            .build()
            .unwrap()
    }

    fn session(plain: &str) -> ImapSession<ScriptedConnector> {
        ImapSession::new(config(SecurityMode::Plain), ScriptedConnector::new(plain))
    }

    #[test]
    fn test_select_reports_exists_before_fetch() {
        let mut s = session(
            "* OK ready\r\n\
            A0001 OK logged in\r\n\
            * FLAGS (\\Seen)\r\n\
            * 5 EXISTS\r\n\
            * 0 RECENT\r\n\
            A0002 OK [READ-WRITE] done\r\n",
        );
        s.connect().unwrap();
        s.login().unwrap();
        assert_eq!(s.select_folder("INBOX").unwrap(), 5);
        assert_eq!(s.message_count(), Some(5));
        assert_eq!(s.state(), ImapState::FolderSelected);
        assert_eq!(
            s.connector.transcript(),
            "A0001 LOGIN \"user\" \"pass\"\r\nA0002 SELECT \"INBOX\"\r\n"
        );
    }

    #[test]
    fn test_full_receive_cycle() {
        let mut s = session(
            "* OK ready\r\n\
            A0001 OK logged in\r\n\
            * 2 EXISTS\r\n\
            A0002 OK done\r\n\
            * 1 FETCH (UID 10 BODY[] {12}\r\n\
            Subject: a\r\n)\r\n\
            * 1 FETCH (FLAGS (\\Recent))\r\n\
            * 2 FETCH (UID 11 BODY[] {3}\r\n\
            abc)\r\n\
            A0003 OK fetched\r\n\
            * BYE bye\r\n\
            A0004 OK logged out\r\n",
        );
        s.connect().unwrap();
        s.login().unwrap();
        s.select_folder("INBOX").unwrap();
        let m = s.fetch_messages().unwrap();
        assert_eq!(m, vec![
            FetchedMessage { sequence: 1, uid: Some(10), raw: b"Subject: a\r\n".to_vec() },
            FetchedMessage { sequence: 2, uid: Some(11), raw: b"abc".to_vec() },
        ]);
        s.logout().unwrap();
        assert_eq!(s.state(), ImapState::Disconnected);
        assert!(s.connector.transcript().ends_with(
            "A0003 FETCH 1:2 (UID BODY.PEEK[])\r\nA0004 LOGOUT\r\n"
        ));
    }

    #[test]
    fn test_empty_folder_is_not_fetched() {
        let mut s = session(
            "* PREAUTH welcome back\r\n\
            * 0 EXISTS\r\n\
            A0001 OK done\r\n",
        );
        s.connect().unwrap();
        assert_eq!(s.state(), ImapState::Authenticated);
        s.login().unwrap();
        assert_eq!(s.select_folder("Archive").unwrap(), 0);
        assert_eq!(s.fetch_messages().unwrap(), vec![]);
        assert_eq!(s.connector.transcript(), "A0001 SELECT \"Archive\"\r\n");
    }

    #[test]
    fn test_bad_greetings() {
        for g in ["* BYE too busy\r\n", "A0001 OK what\r\n", "* 1 EXISTS\r\n", "garbage\r\n", ""].iter() {
            let mut s = session(g);
            assert_eq!(s.connect().unwrap_err().kind(), ErrorKind::Connection, "{:?}", g);
            assert_eq!(s.state(), ImapState::Disconnected);
            assert_eq!(s.connector.transcript(), "");
        }
    }

    #[test]
    fn test_login_rejected() {
        for status in ["NO", "BAD"].iter() {
            let mut s = session(&format!("* OK ready\r\nA0001 {} [AUTHENTICATIONFAILED] nope\r\n", status));
            s.connect().unwrap();
            match s.login() {
                Err(TransportError::Authentication { code, .. }) => assert_eq!(code, *status),
                r => panic!("unexpected result {:?}", r),
            }
            assert_eq!(s.state(), ImapState::Connected);
        }
    }

    #[test]
    fn test_login_requires_credentials() {
        let config = TransportConfig::builder(Protocol::Imap, "imap.example.com")
            .security(SecurityMode::Plain)
            .build()
            .unwrap();
        let mut s = ImapSession::new(config, ScriptedConnector::new("* OK ready\r\n"));
        s.connect().unwrap();
        assert_eq!(s.login().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_starttls_then_login() {
        let c = ScriptedConnector::new(
            "* OK ready\r\n\
            A0001 OK begin TLS\r\n",
        ).with_tls("A0002 OK logged in\r\n");
        let mut s = ImapSession::new(config(SecurityMode::StartTls), c);
        s.connect().unwrap();
        s.negotiate_tls().unwrap();
        assert_eq!(s.state(), ImapState::TlsUpgraded);
        s.login().unwrap();
        assert_eq!(s.connector.upgrades.get(), 1);
        assert_eq!(s.connector.transcript(), "A0001 STARTTLS\r\nA0002 LOGIN \"user\" \"pass\"\r\n");
    }

    #[test]
    fn test_implicit_tls_port() {
        let c = ScriptedConnector::new("").with_tls("* OK ready\r\n");
        let mut s = ImapSession::new(config(SecurityMode::ImplicitTls), c);
        s.connect().unwrap();
        assert_eq!(s.state(), ImapState::TlsUpgraded);
        assert_eq!(s.connector.connected_to.borrow().as_ref().map(|c| c.1), Some(993));
    }

    #[test]
    fn test_literal_login_waits_for_continuation() {
        let config = TransportConfig::builder(Protocol::Imap, "imap.example.com")
            .security(SecurityMode::Plain)
            .credentials(Credentials::new("user", "pąss"))
            .build()
            .unwrap();
        let c = ScriptedConnector::new(
            "* OK ready\r\n\
            + ready for literal\r\n\
            A0001 OK logged in\r\n",
        );
        let mut s = ImapSession::new(config, c);
        s.connect().unwrap();
        s.login().unwrap();
        assert_eq!(s.connector.transcript(), "A0001 LOGIN \"user\" {5}\r\npąss\r\n");
    }

    #[test]
    fn test_fetch_protocol_errors() {
        for fetch in [
            // out of order
            "* 2 FETCH (BODY[] {1}\r\nb)\r\n* 1 FETCH (BODY[] {1}\r\na)\r\n",
            // out of range
            "* 1 FETCH (BODY[] {1}\r\na)\r\n* 3 FETCH (BODY[] {1}\r\nc)\r\n",
            // missing message
            "* 1 FETCH (BODY[] {1}\r\na)\r\n",
            // malformed items
            "* 1 FETCH (BODY[] \r\n* 2 FETCH BODY[]\r\n",
        ].iter() {
            let mut s = session(&format!(
                "* OK ready\r\nA0001 OK in\r\n* 2 EXISTS\r\nA0002 OK sel\r\n{}A0003 OK done\r\n",
                fetch
            ));
            s.connect().unwrap();
            s.login().unwrap();
            s.select_folder("INBOX").unwrap();
            assert_eq!(s.fetch_messages().unwrap_err().kind(), ErrorKind::Protocol, "{:?}", fetch);
        }
    }

    #[test]
    fn test_foreign_tag_is_protocol_error() {
        let mut s = session("* OK ready\r\nB0001 OK not yours\r\n");
        s.connect().unwrap();
        assert_eq!(s.login().unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(s.state(), ImapState::Disconnected);
    }

    #[test]
    fn test_connection_drop_during_select() {
        let mut s = session("* OK ready\r\nA0001 OK in\r\n* 3 EXI");
        s.connect().unwrap();
        s.login().unwrap();
        assert_eq!(s.select_folder("INBOX").unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(s.state(), ImapState::Disconnected);
        s.logout().unwrap();
    }

    #[test]
    fn test_select_failure() {
        let mut s = session("* OK ready\r\nA0001 OK in\r\nA0002 NO no such folder\r\n");
        s.connect().unwrap();
        s.login().unwrap();
        assert_eq!(s.select_folder("Missing").unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!(s.state(), ImapState::Authenticated);
        assert_eq!(s.fetch_messages().unwrap_err().kind(), ErrorKind::Protocol);
    }
}
