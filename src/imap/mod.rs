//! IMAP client side: tagged commands, response reader, `FETCH` item parser and the session.

pub mod command;
pub mod fetch;
pub mod response;
pub mod session;

pub use session::{FetchedMessage, ImapSession, ImapState};
