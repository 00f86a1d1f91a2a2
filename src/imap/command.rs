use std::fmt;

/// TagGenerator hands out monotonic command tags: `A0001`, `A0002`, ...
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    next: u32,
}

impl TagGenerator {
    pub fn new(prefix: char) -> Self {
        Self { prefix, next: 1 }
    }

    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.next);
        self.next = self.next.wrapping_add(1);
        tag
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// Argument is single command argument as it goes over the wire.
#[derive(Clone, PartialEq, Eq)]
pub enum Argument {
    Atom(String),
    Quoted(String),
    Literal(Vec<u8>),
}

fn is_quotable(text: &str) -> bool {
    text.bytes().all(|b| b != b'\r' && b != b'\n' && b != 0 && b.is_ascii())
}

impl Argument {
    /// string picks quoted form when possible and literal otherwise.
    pub fn string(text: &str) -> Self {
        if is_quotable(text) {
            Argument::Quoted(text.to_string())
        } else {
            Argument::Literal(text.as_bytes().to_vec())
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Argument::Atom(a) => out.extend_from_slice(a.as_bytes()),
            Argument::Quoted(q) => {
                out.push(b'"');
                for b in q.bytes() {
                    if b == b'"' || b == b'\\' {
                        out.push(b'\\');
                    }
                    out.push(b);
                }
                out.push(b'"');
            }
            Argument::Literal(l) => out.extend_from_slice(format!("{{{}}}\r\n", l.len()).as_bytes()),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    StartTls,
    Login { username: String, password: String },
    Select(String),
    /// Fetch asks for UID and whole message of sequence range without setting `\Seen`.
    Fetch { first: u32, last: u32 },
    Logout,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::StartTls => "STARTTLS",
            Command::Login { .. } => "LOGIN",
            Command::Select(_) => "SELECT",
            Command::Fetch { .. } => "FETCH",
            Command::Logout => "LOGOUT",
        }
    }

    fn arguments(&self) -> Vec<Argument> {
        match self {
            Command::StartTls | Command::Logout => vec![],
            Command::Login { username, password } => {
                vec![Argument::string(username), Argument::string(password)]
            }
            Command::Select(folder) => vec![Argument::string(folder)],
            Command::Fetch { first, last } => vec![
                Argument::Atom(if first == last { first.to_string() } else { format!("{}:{}", first, last) }),
                Argument::Atom("(UID BODY.PEEK[])".to_string()),
            ],
        }
    }

    /// encode renders tagged command split into chunks.
    /// Client has to wait for continuation request after each chunk except the last one,
    /// because every chunk but the last ends with literal announcement.
    pub fn encode(&self, tag: &str) -> Vec<Vec<u8>> {
        let mut chunks = Vec::new();
        let mut current = format!("{} {}", tag, self.verb()).into_bytes();
        for arg in self.arguments() {
            current.push(b' ');
            arg.write_to(&mut current);
            if let Argument::Literal(data) = arg {
                chunks.push(current);
                current = data;
            }
        }
        current.extend_from_slice(b"\r\n");
        chunks.push(current);
        chunks
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Login { username, .. } => write!(f, "LOGIN {} <redacted>", username),
            Command::Select(folder) => write!(f, "SELECT {:?}", folder),
            Command::Fetch { first, last } => write!(f, "FETCH {}:{} (UID BODY.PEEK[])", first, last),
            c => f.write_str(c.verb()),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
