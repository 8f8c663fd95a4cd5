//! Single-use SMTP session with type-state transitions.

mod stream;

pub use stream::{SmtpStream, TlsPolicy, connect};

use crate::address::Address;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::reply::{Reply, ReplyCode};
use base64::Engine;
use std::marker::PhantomData;

/// Type-state marker: greeting consumed, EHLO exchanged, no transaction yet.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker: AUTH PLAIN accepted.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker: MAIL FROM accepted.
#[derive(Debug)]
pub struct Envelope;

/// Type-state marker: at least one RCPT TO accepted.
#[derive(Debug)]
pub struct Addressed;

/// Type-state marker: DATA accepted, server is reading the payload.
#[derive(Debug)]
pub struct DataPhase;

/// Type-state marker: payload accepted, transaction complete.
#[derive(Debug)]
pub struct Finished;

/// A single-use SMTP client session.
///
/// One session carries exactly one message over one connection. There is no
/// RSET, no second transaction, and no connection reuse: after the payload
/// is accepted (or any step fails) the session is torn down by dropping it,
/// optionally after a best-effort [`Session::quit`].
#[derive(Debug)]
pub struct Session<State> {
    stream: SmtpStream,
    _state: PhantomData<State>,
}

impl Session<Connected> {
    /// Creates a session from a stream by consuming the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server greets
    /// with an error code.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = Self::read_reply(&mut stream).await?;
        let greeting = expect_success(greeting)?;
        tracing::debug!(greeting = %greeting.message_text(), "server ready");

        Ok(Self {
            stream,
            _state: PhantomData,
        })
    }

    /// Sends EHLO to announce the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        expect_success(reply)?;
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS.
    ///
    /// The command is issued without consulting the server's advertised
    /// capabilities; a server that does not support it answers with an
    /// error reply. After the handshake EHLO is sent again, as required on
    /// the fresh encrypted channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects STARTTLS or the handshake
    /// fails.
    pub async fn starttls(mut self, hostname: &str, policy: TlsPolicy) -> Result<Self> {
        let reply = self.send_command(Command::StartTls).await?;
        expect_success(reply)?;

        tracing::debug!(hostname, ?policy, "upgrading connection to TLS");
        self.stream = self.stream.upgrade_to_tls(hostname, policy).await?;

        let reply = self
            .send_command(Command::Ehlo {
                hostname: hostname.to_string(),
            })
            .await?;
        expect_success(reply)?;

        Ok(self)
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Session<Authenticated>> {
        // PLAIN initial response: \0username\0password
        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let reply = self
            .send_command(Command::AuthPlain {
                initial_response: encoded,
            })
            .await?;
        expect_success(reply)?;

        Ok(Session {
            stream: self.stream,
            _state: PhantomData,
        })
    }

    /// Starts the mail transaction without authenticating first.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(self, from: Address) -> Result<Session<Envelope>> {
        self.start_envelope(from).await
    }
}

impl Session<Authenticated> {
    /// Starts the mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(self, from: Address) -> Result<Session<Envelope>> {
        self.start_envelope(from).await
    }
}

impl Session<Envelope> {
    /// Adds the first recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Session<Addressed>> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        expect_success(reply)?;

        Ok(Session {
            stream: self.stream,
            _state: PhantomData,
        })
    }
}

impl Session<Addressed> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        expect_success(reply)?;
        Ok(self)
    }

    /// Opens the data phase.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command is not answered with 354.
    pub async fn data(mut self) -> Result<Session<DataPhase>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(Error::smtp(reply.code.as_u16(), reply.message_text()));
        }

        Ok(Session {
            stream: self.stream,
            _state: PhantomData,
        })
    }
}

impl Session<DataPhase> {
    /// Writes the message payload and finalizes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// byte-stuffed, and the terminating `.` line is appended, so the wire
    /// carries exactly the given bytes under the DATA-phase conventions.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the server rejects the message.
    pub async fn send_payload(mut self, message: &[u8]) -> Result<Session<Finished>> {
        let mut lines = message.split(|&b| b == b'\n').peekable();
        while let Some(line) = lines.next() {
            // A message ending in a newline yields one empty trailing
            // chunk; the terminator below supplies that CRLF.
            if line.is_empty() && lines.peek().is_none() {
                break;
            }

            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if line.first() == Some(&b'.') {
                self.stream.write_all(b".").await?;
            }
            self.stream.write_all(line).await?;
            self.stream.write_all(b"\r\n").await?;
        }

        self.stream.write_all(b".\r\n").await?;

        let reply = Self::read_reply(&mut self.stream).await?;
        expect_success(reply)?;

        Ok(Session {
            stream: self.stream,
            _state: PhantomData,
        })
    }
}

// Shared across all states.
impl<S> Session<S> {
    async fn start_envelope(mut self, from: Address) -> Result<Session<Envelope>> {
        let reply = self.send_command(Command::MailFrom { from }).await?;
        expect_success(reply)?;

        Ok(Session {
            stream: self.stream,
            _state: PhantomData,
        })
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::trace!(verb = cmd.verb(), "sending command");
        let data = cmd.serialize();
        self.stream.write_all(&data).await?;
        Self::read_reply(&mut self.stream).await
    }

    async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = stream.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_final = Reply::is_final_line(&line);
            lines.push(line);

            if is_final {
                break;
            }
        }

        Reply::parse(&lines)
    }

    /// Sends QUIT and consumes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        expect_success(reply)?;
        Ok(())
    }
}

fn expect_success(reply: Reply) -> Result<Reply> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(Error::smtp(reply.code.as_u16(), reply.message_text()))
    }
}
