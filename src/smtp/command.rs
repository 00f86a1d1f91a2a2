use std::fmt;

/// Command is SMTP command sent by client.
///
/// `Display` renders command for logs and error messages, with credentials hidden.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    Ehlo(String),
    StartTls,
    AuthPlain(String),
    AuthLogin,
    /// AuthResponse is base64 answer to `334` challenge.
    AuthResponse(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Quit,
}

impl Command {
    /// to_line renders command as sent over the wire, CRLF included.
    pub fn to_line(&self) -> String {
        match self {
            Command::Ehlo(domain) => format!("EHLO {}\r\n", domain),
            Command::StartTls => "STARTTLS\r\n".to_string(),
            Command::AuthPlain(payload) => format!("AUTH PLAIN {}\r\n", payload),
            Command::AuthLogin => "AUTH LOGIN\r\n".to_string(),
            Command::AuthResponse(payload) => format!("{}\r\n", payload),
            Command::MailFrom(address) => format!("MAIL FROM:<{}>\r\n", address),
            Command::RcptTo(address) => format!("RCPT TO:<{}>\r\n", address),
            Command::Data => "DATA\r\n".to_string(),
            Command::Rset => "RSET\r\n".to_string(),
            Command::Quit => "QUIT\r\n".to_string(),
        }
    }

    /// verb returns command name without arguments.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Ehlo(_) => "EHLO",
            Command::StartTls => "STARTTLS",
            Command::AuthPlain(_) => "AUTH PLAIN",
            Command::AuthLogin | Command::AuthResponse(_) => "AUTH LOGIN",
            Command::MailFrom(_) => "MAIL FROM",
            Command::RcptTo(_) => "RCPT TO",
            Command::Data => "DATA",
            Command::Rset => "RSET",
            Command::Quit => "QUIT",
        }
    }

    /// is_single_line checks that argument can't end command line early.
    pub fn is_single_line(&self) -> bool {
        let argument = match self {
            Command::Ehlo(a) | Command::AuthPlain(a) | Command::AuthResponse(a) => a,
            Command::MailFrom(a) | Command::RcptTo(a) => a,
            _ => return true,
        };
        !argument.contains(|c| c == '\r' || c == '\n')
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::AuthPlain(_) => f.write_str("AUTH PLAIN <redacted>"),
            Command::AuthResponse(_) => f.write_str("<redacted>"),
            c => f.write_str(c.to_line().trim_end()),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// dot_stuff prepares message for `DATA`: lines starting with `.` get another `.`,
/// and terminating `.` line is appended.
pub fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(data.len() + data.len() / 64 + 5);
    let mut line_start = true;
    for b in data.iter().copied() {
        if line_start && b == b'.' {
            res.push(b'.');
        }
        res.push(b);
        line_start = b == b'\n';
    }
    if !res.is_empty() && !res.ends_with(b"\r\n") {
        res.extend_from_slice(b"\r\n");
    }
    res.extend_from_slice(b".\r\n");
    res
}
