//! Mail module contains the message model and its MIME representation:
//! - Email addresses
//! - Email headers
//! - Encoding outgoing messages and decoding received ones

pub mod address;
pub mod decoder;
pub mod encoder;
pub mod header;
pub mod message;
pub mod part;
