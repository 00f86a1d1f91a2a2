//! SMTP client side: reply parsing, commands, SASL and the session state machine.

pub mod auth;
pub mod command;
pub mod reply;
pub mod session;

pub use session::{SmtpSession, SmtpState};
