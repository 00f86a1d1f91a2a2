//! SASL mechanisms for `AUTH`.

use crate::config::Credentials;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mechanism {
    Plain,
    Login,
}

impl Mechanism {
    pub fn name(self) -> &'static str {
        match self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
        }
    }
}

/// advertised_mechanisms extracts mechanisms from `AUTH` lines of EHLO reply.
/// Old style `AUTH=LOGIN` lines are accepted too.
pub fn advertised_mechanisms(ehlo_lines: &[String]) -> Vec<String> {
    let mut res = Vec::new();
    for line in ehlo_lines.iter() {
        let upper = line.trim().to_ascii_uppercase();
        let rest = if upper.starts_with("AUTH ") || upper.starts_with("AUTH=") {
            &upper[5..]
        } else {
            continue;
        };
        for m in rest.split_whitespace() {
            if !res.iter().any(|r: &String| r == m) {
                res.push(m.to_string());
            }
        }
    }
    res
}

/// select_mechanism prefers PLAIN. LOGIN is used only if server advertises it without PLAIN.
pub fn select_mechanism(ehlo_lines: &[String]) -> Mechanism {
    let advertised = advertised_mechanisms(ehlo_lines);
    let has = |m: &str| advertised.iter().any(|a| a == m);
    if !has("PLAIN") && has("LOGIN") {
        Mechanism::Login
    } else {
        Mechanism::Plain
    }
}

/// plain_response encodes `\0username\0password` initial response.
pub fn plain_response(credentials: &Credentials) -> String {
    let mut payload = Vec::with_capacity(credentials.username.len() + credentials.password.len() + 2);
    payload.push(0);
    payload.extend_from_slice(credentials.username.as_bytes());
    payload.push(0);
    payload.extend_from_slice(credentials.password.as_bytes());
    base64::encode(&payload)
}

/// login_responses returns base64 username and password answers for LOGIN challenges.
pub fn login_responses(credentials: &Credentials) -> (String, String) {
    (
        base64::encode(credentials.username.as_bytes()),
        base64::encode(credentials.password.as_bytes()),
    )
}
