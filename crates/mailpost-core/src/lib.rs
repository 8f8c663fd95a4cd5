//! # mailpost-core
//!
//! Declarative email sending over SMTP.
//!
//! This crate provides:
//! - Connection configuration with environment fallback ([`config`])
//! - The outgoing message model, recipient normalization, and message
//!   composition ([`message`])
//! - The content-derived message identifier ([`identity`])
//! - The single-attempt send pipeline ([`dispatch`])
//! - The create/update/read/delete resource lifecycle ([`resource`])
//!
//! A send is one sequential pass: normalize recipients, compose the
//! message, connect, optionally upgrade to TLS and authenticate, issue the
//! envelope, transmit the payload, tear the connection down. Nothing is
//! retried and no connection is reused; the returned identifier is a pure
//! function of the composed message bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
mod error;
pub mod identity;
pub mod message;
pub mod resource;

pub use config::{ConfigError, ConfigOverrides, ConnectionConfig, Credentials};
pub use dispatch::{DispatchError, SendResult, send, send_cancellable};
pub use error::{Error, Result};
pub use identity::message_id;
pub use message::{ComposedMessage, SendRequest, unique_in_order};
pub use resource::SendMailResource;
