//! # mailpost-smtp
//!
//! A single-use SMTP client session: one connection, one message.
//!
//! The [`Session`] type uses the type-state pattern so that the legal
//! command order is enforced at compile time:
//!
//! ```text
//! Connected ── starttls() ──→ Connected (encrypted)
//!     │                           │
//!     │                     auth_plain()
//!     │                           ↓
//!     └────── mail_from() ── Authenticated
//!                 ↓
//!             Envelope ── rcpt_to() ──→ Addressed ── data() ──→ DataPhase
//!                                                                   │
//!                                                            send_payload()
//!                                                                   ↓
//!                                                               Finished
//! ```
//!
//! Protocol coverage is deliberately narrow (EHLO, STARTTLS, AUTH PLAIN,
//! MAIL, RCPT, DATA, QUIT): the session exists to deliver exactly one
//! message and is torn down afterwards.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
pub mod command;
mod error;
mod reply;
pub mod session;

pub use address::Address;
pub use error::{Error, Result};
pub use reply::{Reply, ReplyCode};
pub use session::{
    Addressed, Authenticated, Connected, DataPhase, Envelope, Finished, Session, SmtpStream,
    TlsPolicy, connect,
};
