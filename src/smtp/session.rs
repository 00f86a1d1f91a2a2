use std::io;

use log::{debug, info, warn};

use crate::config::{SecurityMode, TransportConfig};
use crate::error::{RejectedRecipient, TransportError, TransportResult};
use crate::mail::message::EmailMessage;
use crate::net::{Connector, LineChannel};
use crate::smtp::auth::{login_responses, plain_response, select_mechanism, Mechanism};
use crate::smtp::command::{dot_stuff, Command};
use crate::smtp::reply::{Reply, ReplyError};

pub const DEFAULT_CLIENT_NAME: &str = "localhost";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SmtpState {
    Disconnected,
    Connected,
    TlsUpgraded,
    Authenticated,
    InTransaction,
}

/// SmtpSession drives single SMTP connection:
/// `connect`, `negotiate_tls`, `authenticate`, `send_transaction`, `quit`.
///
/// Any stream failure or timeout drops connection, moves session to `Disconnected`
/// and is reported as connection error.
pub struct SmtpSession<C: Connector> {
    config: TransportConfig,
    connector: C,
    channel: Option<LineChannel<C::Stream>>,
    state: SmtpState,
    client_name: String,
    ehlo_lines: Vec<String>,
}

impl<C: Connector> SmtpSession<C> {
    pub fn new(config: TransportConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            channel: None,
            state: SmtpState::Disconnected,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            ehlo_lines: Vec::new(),
        }
    }

    /// with_client_name sets domain sent in `EHLO`.
    pub fn with_client_name<N: Into<String>>(mut self, name: N) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn state(&self) -> SmtpState {
        self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// capabilities returns lines of last EHLO reply except greeting line.
    pub fn capabilities(&self) -> &[String] {
        if self.ehlo_lines.is_empty() {
            &[]
        } else {
            &self.ehlo_lines[1..]
        }
    }

    fn host(&self) -> &str {
        self.config.host()
    }

    fn drop_connection(&mut self) {
        self.channel = None;
        self.state = SmtpState::Disconnected;
        self.ehlo_lines.clear();
    }

    fn io_failure(&mut self, e: io::Error) -> TransportError {
        warn!("connection to {} lost: {}", self.host(), e);
        self.drop_connection();
        TransportError::connection(self.config.host(), e)
    }

    fn reply_failure(&mut self, command: &str, e: ReplyError) -> TransportError {
        match e {
            ReplyError::Io(e) => self.io_failure(e),
            e => {
                // stream can't be trusted to be in sync anymore
                self.drop_connection();
                TransportError::protocol(self.config.host(), command, "-", &e.to_string())
            }
        }
    }

    fn unexpected(&self, command: &str, reply: &Reply) -> TransportError {
        TransportError::protocol(self.host(), command, reply.code, &reply.text())
    }

    fn require_state(&self, command: &str, allowed: &[SmtpState]) -> TransportResult<()> {
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

    fn read_reply(&mut self, command: &str) -> TransportResult<Reply> {
        let res = match self.channel.as_mut() {
            Some(c) => Reply::read(c),
            None => return Err(TransportError::connection(self.config.host(), "not connected")),
        };
        match res {
            Ok(r) => {
                debug!("S: {} {}", r.code, r.text());
                Ok(r)
            }
            Err(e) => Err(self.reply_failure(command, e)),
        }
    }

    fn send_raw(&mut self, data: &[u8]) -> TransportResult<()> {
        let res = match self.channel.as_mut() {
            Some(c) => c.write_all(data),
            None => return Err(TransportError::connection(self.config.host(), "not connected")),
        };
        res.map_err(|e| self.io_failure(e))
    }

    /// command sends command and reads whole reply to it.
    fn command(&mut self, command: &Command) -> TransportResult<Reply> {
        if !command.is_single_line() {
            return Err(TransportError::protocol(
                self.host(),
                command.verb(),
                "-",
                "refusing to send argument with line break",
            ));
        }
        debug!("C: {}", command);
        self.send_raw(command.to_line().as_bytes())?;
        self.read_reply(&command.to_string())
    }

    fn ehlo(&mut self) -> TransportResult<()> {
        let cmd = Command::Ehlo(self.client_name.clone());
        let reply = self.command(&cmd)?;
        if reply.code != 250 {
            return Err(self.unexpected(&cmd.to_string(), &reply));
        }
        self.ehlo_lines = reply.lines;
        Ok(())
    }

    /// connect opens connection and reads greeting.
    /// Implicit TLS handshake happens before greeting is read.
    pub fn connect(&mut self) -> TransportResult<()> {
        self.require_state("connect", &[SmtpState::Disconnected])?;
        let host = self.config.host().to_string();
        let port = self.config.port();
        info!("connecting to SMTP server {}:{} ({:?})", host, port, self.config.security());

        let mut stream = self.connector
            .connect(&host, port, self.config.timeout())
            .map_err(|e| TransportError::connection(&host, e))?;
        if self.config.security() == SecurityMode::ImplicitTls {
            stream = self.connector
                .start_tls(stream, &host)
                .map_err(|e| TransportError::connection(&host, e))?;
        }
        self.channel = Some(LineChannel::new(stream));
        self.state = SmtpState::Connected;

        let greeting = match self.channel.as_mut().map(Reply::read) {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                self.drop_connection();
                return Err(TransportError::connection(&host, format!("bad greeting: {}", e)));
            }
            None => return Err(TransportError::connection(&host, "not connected")),
        };
        debug!("S: {} {}", greeting.code, greeting.text());
        if greeting.code != 220 {
            self.drop_connection();
            return Err(TransportError::connection(
                &host,
                format!("greeting {} {}", greeting.code, greeting.text()),
            ));
        }
        if self.config.security() == SecurityMode::ImplicitTls {
            self.state = SmtpState::TlsUpgraded;
        }
        info!("connected to {}: {}", host, greeting.text());
        Ok(())
    }

    /// negotiate_tls upgrades plain connection with `STARTTLS`.
    /// It does nothing unless security mode is `StartTls`.
    pub fn negotiate_tls(&mut self) -> TransportResult<()> {
        if self.config.security() != SecurityMode::StartTls {
            return Ok(());
        }
        self.require_state("STARTTLS", &[SmtpState::Connected])?;
        self.ehlo()?;

        let reply = self.command(&Command::StartTls)?;
        if reply.code != 220 {
            return Err(self.unexpected("STARTTLS", &reply));
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
                reply.code,
                "server sent data before TLS handshake",
            ));
        }
        let host = self.config.host().to_string();
        match self.connector.start_tls(channel.into_inner(), &host) {
            Ok(stream) => {
                self.channel = Some(LineChannel::new(stream));
                self.state = SmtpState::TlsUpgraded;
                // capabilities have to be asked for again over encrypted channel
                self.ehlo_lines.clear();
                info!("STARTTLS upgrade with {} done", host);
                Ok(())
            }
            Err(e) => Err(self.io_failure(e)),
        }
    }

    fn auth_failure(&self, command: &str, reply: &Reply) -> TransportError {
        if reply.is_permanent_failure() {
            TransportError::authentication(self.host(), reply.code, &reply.text())
        } else {
            self.unexpected(command, reply)
        }
    }

    /// authenticate sends `EHLO` and, when credentials are configured, `AUTH`.
    pub fn authenticate(&mut self) -> TransportResult<()> {
        self.require_state("AUTH", &[SmtpState::Connected, SmtpState::TlsUpgraded])?;
        if self.config.security() == SecurityMode::StartTls && self.state != SmtpState::TlsUpgraded {
            return Err(TransportError::protocol(
                self.host(),
                "AUTH",
                "-",
                "STARTTLS has to be negotiated first",
            ));
        }
        self.ehlo()?;

        let credentials = match self.config.credentials() {
            Some(c) => c.clone(),
            None => {
                self.state = SmtpState::Authenticated;
                return Ok(());
            }
        };

        let mechanism = select_mechanism(&self.ehlo_lines);
        debug!("authenticating as {} with {}", credentials.username, mechanism.name());
        let reply = match mechanism {
            Mechanism::Plain => {
                let cmd = Command::AuthPlain(plain_response(&credentials));
                self.command(&cmd)?
            }
            Mechanism::Login => {
                let (user, pass) = login_responses(&credentials);
                let steps = [Command::AuthLogin, Command::AuthResponse(user)];
                for step in steps.iter() {
                    let reply = self.command(step)?;
                    if reply.code != 334 {
                        return Err(self.auth_failure("AUTH LOGIN", &reply));
                    }
                }
                self.command(&Command::AuthResponse(pass))?
            }
        };
        if reply.code != 235 {
            return Err(self.auth_failure(&format!("AUTH {}", mechanism.name()), &reply));
        }
        self.state = SmtpState::Authenticated;
        info!("authenticated to {} as {}", self.host(), credentials.username);
        Ok(())
    }

    /// send_transaction runs `MAIL FROM`, `RCPT TO` for every recipient (to, cc, bcc) and `DATA`.
    ///
    /// Recipients refused by server are returned. When all of them are refused no data is sent
    /// and protocol error is returned. If transaction is refused before message data is sent,
    /// `RSET` returns session to `Authenticated`.
    pub fn send_transaction(&mut self, message: &EmailMessage, encoded: &[u8]) -> TransportResult<Vec<RejectedRecipient>> {
        let addresses = message.validate()?;
        self.require_state("MAIL FROM", &[SmtpState::Authenticated])?;

        let cmd = Command::MailFrom(addresses.sender.address.clone());
        let reply = self.command(&cmd)?;
        if !reply.is_positive_completion() {
            return Err(self.unexpected(&cmd.to_string(), &reply));
        }
        self.state = SmtpState::InTransaction;

        let mut rejected = Vec::new();
        let mut accepted = 0;
        let mut last_refusal = None;
        for address in addresses.envelope() {
            let cmd = Command::RcptTo(address.to_string());
            let reply = self.command(&cmd)?;
            if reply.is_positive_completion() {
                accepted += 1;
            } else {
                warn!("{} refused recipient {}: {} {}", self.host(), address, reply.code, reply.text());
                rejected.push(RejectedRecipient {
                    address: address.to_string(),
                    code: reply.code,
                    text: reply.text(),
                });
                last_refusal = Some((cmd, reply));
            }
        }
        if accepted == 0 {
            let (cmd, reply) = match last_refusal {
                Some(r) => r,
                None => return Err(TransportError::protocol(self.host(), "RCPT TO", "-", "no recipients")),
            };
            let err = self.unexpected(&cmd.to_string(), &reply);
            self.abort_transaction();
            return Err(err);
        }

        let reply = self.command(&Command::Data)?;
        if reply.code != 354 {
            let err = self.unexpected("DATA", &reply);
            self.abort_transaction();
            return Err(err);
        }
        debug!("C: <{} bytes of message data>", encoded.len());
        self.send_raw(&dot_stuff(encoded))?;
        let reply = self.read_reply("DATA")?;
        self.state = SmtpState::Authenticated;
        if !reply.is_positive_completion() {
            return Err(self.unexpected("DATA", &reply));
        }
        info!(
            "{} accepted message for {} recipient(s): {}",
            self.host(),
            accepted,
            reply.text()
        );
        Ok(rejected)
    }

    /// abort_transaction sends `RSET` after failed transaction, so session can be reused.
    /// Failure of `RSET` itself is only logged.
    fn abort_transaction(&mut self) {
        match self.command(&Command::Rset) {
            Ok(ref r) if r.is_positive_completion() => self.state = SmtpState::Authenticated,
            Ok(r) => {
                warn!("{} refused RSET: {} {}", self.host(), r.code, r.text());
                self.state = SmtpState::Authenticated;
            }
            Err(e) => warn!("RSET failed: {}", e),
        }
    }

    /// quit sends `QUIT` and closes connection whatever server answers.
    pub fn quit(&mut self) -> TransportResult<()> {
        if self.channel.is_none() {
            self.state = SmtpState::Disconnected;
            return Ok(());
        }
        let res = self.command(&Command::Quit);
        self.drop_connection();
        info!("SMTP connection to {} closed", self.host());
        res.map(|_| ())
    }
}
