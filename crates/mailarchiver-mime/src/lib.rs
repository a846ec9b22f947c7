//! # mailarchiver-mime
//!
//! Message reading and header interpretation for the mail archiver.
//!
//! ## Features
//!
//! - **Header parsing**: Case-insensitive, multi-valued header maps read from raw bytes
//! - **Encoded words**: RFC 2047 decoding with any charset known to `encoding_rs`
//! - **Addresses**: Display name / address splitting for `From`-style headers
//! - **Dates**: Strict RFC 2822 parsing with a permissive fallback chain
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailarchiver_mime::{RawMessage, parse_address, parse_date};
//!
//! let message = RawMessage::load("Mail/lists/cur/1700000000.M1P2.host:2,S")?;
//! let from = parse_address(message.headers.get("from").unwrap_or_default());
//! let date = parse_date(message.headers.get("date"));
//! println!("{} <{}> at {}", from.name, from.email, date.timestamp());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod date;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Mailbox, parse_address};
pub use date::{DateSource, MessageDate, parse_date};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::RawMessage;
