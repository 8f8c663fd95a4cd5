//! The single-attempt send pipeline.

use crate::config::ConnectionConfig;
use crate::identity;
use crate::message::{ComposedMessage, SendRequest};
use mailpost_smtp::{Address, Session, TlsPolicy, connect};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Name announced in EHLO.
const CLIENT_NAME: &str = "localhost";

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    /// Lowercase-hex digest of the composed message bytes. The sole
    /// persisted state of a send.
    pub id: String,
}

/// Errors from the send pipeline.
///
/// Every variant is terminal for the invocation: the first failure is
/// returned, no further protocol steps are attempted, and nothing is
/// retried. Wire variants carry the underlying transport or protocol error
/// text.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request failed local validation; nothing was sent.
    #[error("invalid send request: {0}")]
    InvalidRequest(String),

    /// Connecting to the server failed.
    #[error("error connecting to SMTP server: {0}")]
    Connection(String),

    /// The STARTTLS upgrade failed.
    #[error("error upgrading connection to TLS: {0}")]
    TlsUpgrade(String),

    /// Authentication failed.
    #[error("error authenticating with SMTP server: {0}")]
    Auth(String),

    /// The server rejected the sender.
    #[error("error setting sender address: {0}")]
    Envelope(String),

    /// The server rejected a recipient. The whole send is abandoned; later
    /// recipients are not attempted.
    #[error("error setting recipient address {address}: {reason}")]
    Recipient {
        /// The rejected address.
        address: String,
        /// Error text from the server.
        reason: String,
    },

    /// Writing or finalizing the message payload failed.
    #[error("error transmitting message: {0}")]
    Transmission(String),

    /// The caller's cancellation signal fired while the send was in flight.
    #[error("send cancelled before completion")]
    Cancelled,
}

/// Sends one message: normalize recipients, compose, connect, optionally
/// upgrade to TLS and authenticate, issue the envelope, transmit.
///
/// One invocation opens one connection and always tears it down; there is
/// no pooling, no reuse, and no retry. STARTTLS and AUTH PLAIN happen only
/// when the configuration carries credentials, and the upgrade accepts any
/// server certificate ([`TlsPolicy::AcceptInvalid`]); the peer's identity
/// is not verified.
///
/// No internal timeout is imposed; callers needing bounded latency should
/// use [`send_cancellable`] or wrap the call in `tokio::time::timeout`.
///
/// # Errors
///
/// Returns the first [`DispatchError`] encountered; later protocol steps
/// are not attempted.
pub async fn send(
    config: &ConnectionConfig,
    request: &SendRequest,
) -> Result<SendResult, DispatchError> {
    let sender = resolve_sender(config, request)?;
    let recipients = envelope_addresses(request)?;
    let composed = ComposedMessage::compose(request);

    tracing::debug!(host = %config.host, port = config.port, "connecting to SMTP server");
    let stream = connect(&config.host, config.port)
        .await
        .map_err(|e| DispatchError::Connection(e.to_string()))?;
    let session = Session::from_stream(stream)
        .await
        .map_err(|e| DispatchError::Connection(e.to_string()))?;
    let session = session
        .ehlo(CLIENT_NAME)
        .await
        .map_err(|e| DispatchError::Connection(e.to_string()))?;

    // Transport security is asserted only alongside authentication: no
    // credentials, no STARTTLS.
    let envelope = if let Some(credentials) = &config.credentials {
        let session = session
            .starttls(&config.host, TlsPolicy::AcceptInvalid)
            .await
            .map_err(|e| DispatchError::TlsUpgrade(e.to_string()))?;
        let session = session
            .auth_plain(&credentials.username, &credentials.password)
            .await
            .map_err(|e| DispatchError::Auth(e.to_string()))?;
        session
            .mail_from(sender)
            .await
            .map_err(|e| DispatchError::Envelope(e.to_string()))?
    } else {
        session
            .mail_from(sender)
            .await
            .map_err(|e| DispatchError::Envelope(e.to_string()))?
    };

    let mut remaining = recipients.into_iter();
    let Some(first) = remaining.next() else {
        // Unreachable: envelope_addresses rejects an empty recipient list.
        return Err(DispatchError::InvalidRequest(
            "at least one recipient is required".into(),
        ));
    };
    let mut session = envelope
        .rcpt_to(first.clone())
        .await
        .map_err(|e| recipient_error(&first, &e))?;
    for address in remaining {
        session = session
            .rcpt_to(address.clone())
            .await
            .map_err(|e| recipient_error(&address, &e))?;
    }

    let session = session
        .data()
        .await
        .map_err(|e| DispatchError::Transmission(e.to_string()))?;
    let session = session
        .send_payload(&composed.raw)
        .await
        .map_err(|e| DispatchError::Transmission(e.to_string()))?;

    // The transaction is already final; QUIT is a courtesy.
    if let Err(e) = session.quit().await {
        tracing::debug!(error = %e, "QUIT after delivery failed");
    }

    let id = identity::message_id(&composed.raw);
    tracing::info!(%id, "email sent");
    Ok(SendResult { id })
}

/// Like [`send`], racing the pipeline against a cancellation future.
///
/// When `cancel` completes first, the in-flight pipeline is dropped, which
/// closes the socket immediately without waiting for further protocol
/// steps, and [`DispatchError::Cancelled`] is returned.
///
/// # Errors
///
/// Returns the pipeline's error, or [`DispatchError::Cancelled`] if the
/// signal fired first.
pub async fn send_cancellable(
    config: &ConnectionConfig,
    request: &SendRequest,
    cancel: impl Future<Output = ()>,
) -> Result<SendResult, DispatchError> {
    tokio::select! {
        result = send(config, request) => result,
        () = cancel => {
            tracing::warn!("send cancelled, dropping connection");
            Err(DispatchError::Cancelled)
        }
    }
}

/// Effective sender: explicit `from` when non-empty, else the configured
/// username.
fn resolve_sender(
    config: &ConnectionConfig,
    request: &SendRequest,
) -> Result<Address, DispatchError> {
    let from = request
        .from
        .as_deref()
        .filter(|from| !from.is_empty())
        .or_else(|| {
            config
                .credentials
                .as_ref()
                .map(|credentials| credentials.username.as_str())
        });

    let Some(from) = from else {
        return Err(DispatchError::InvalidRequest(
            "a sender is required: set `from` or configure a username".into(),
        ));
    };

    Address::new(from).map_err(|e| DispatchError::InvalidRequest(e.to_string()))
}

/// Deduplicated, validated envelope recipients in first-seen order.
fn envelope_addresses(request: &SendRequest) -> Result<Vec<Address>, DispatchError> {
    if request.to.is_empty() {
        return Err(DispatchError::InvalidRequest(
            "at least one `to` recipient is required".into(),
        ));
    }

    request
        .envelope_recipients()
        .into_iter()
        .map(|address| {
            Address::new(address).map_err(|e| DispatchError::InvalidRequest(e.to_string()))
        })
        .collect()
}

fn recipient_error(address: &Address, error: &mailpost_smtp::Error) -> DispatchError {
    DispatchError::Recipient {
        address: address.to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// What a scripted server observed: every command line received before
    /// the data phase, and every payload line between DATA and the
    /// terminating dot.
    #[derive(Debug, Default)]
    struct Transcript {
        commands: Vec<String>,
        payload: Vec<String>,
    }

    impl Transcript {
        fn rcpt_lines(&self) -> Vec<&str> {
            self.commands
                .iter()
                .filter(|c| c.starts_with("RCPT"))
                .map(String::as_str)
                .collect()
        }

        fn saw(&self, verb: &str) -> bool {
            self.commands.iter().any(|c| c.starts_with(verb))
        }
    }

    struct ScriptedServer {
        addr: SocketAddr,
        handle: JoinHandle<Transcript>,
    }

    impl ScriptedServer {
        /// Accepts one session. Replies 250 to everything except DATA
        /// (354, then collects payload lines) and QUIT (221); when
        /// `fail_rcpt_at` is set, that RCPT (1-based) is answered 550.
        async fn spawn(fail_rcpt_at: Option<usize>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let handle = tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                serve(stream, fail_rcpt_at).await
            });
            Self { addr, handle }
        }

        fn config(&self) -> ConnectionConfig {
            ConnectionConfig {
                host: self.addr.ip().to_string(),
                port: self.addr.port(),
                credentials: None,
            }
        }

        async fn transcript(self) -> Transcript {
            self.handle.await.unwrap()
        }
    }

    async fn serve(stream: TcpStream, fail_rcpt_at: Option<usize>) -> Transcript {
        let mut transcript = Transcript::default();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(b"220 scripted ESMTP ready\r\n")
            .await
            .unwrap();

        let mut rcpt_count = 0usize;
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let command = line.trim_end().to_string();
            transcript.commands.push(command.clone());

            if command.starts_with("EHLO") {
                write_half
                    .write_all(b"250-scripted greets you\r\n250 AUTH PLAIN\r\n")
                    .await
                    .unwrap();
            } else if command.starts_with("RCPT") {
                rcpt_count += 1;
                if fail_rcpt_at == Some(rcpt_count) {
                    write_half
                        .write_all(b"550 mailbox unavailable\r\n")
                        .await
                        .unwrap();
                } else {
                    write_half.write_all(b"250 OK\r\n").await.unwrap();
                }
            } else if command == "DATA" {
                write_half.write_all(b"354 go ahead\r\n").await.unwrap();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await.unwrap() == 0 {
                        break;
                    }
                    let data_line = line.trim_end().to_string();
                    if data_line == "." {
                        break;
                    }
                    transcript.payload.push(data_line);
                }
                write_half
                    .write_all(b"250 message accepted\r\n")
                    .await
                    .unwrap();
            } else if command == "QUIT" {
                write_half.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                write_half.write_all(b"250 OK\r\n").await.unwrap();
            }
        }

        transcript
    }

    #[tokio::test]
    async fn deduplicated_envelope_with_hidden_bcc() {
        let server = ScriptedServer::spawn(None).await;
        let config = server.config();
        let request = SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test")
            .to("b@x.test")
            .cc("b@x.test")
            .cc("c@x.test")
            .bcc("d@x.test");

        let result = send(&config, &request).await.unwrap();
        let transcript = server.transcript().await;

        // Envelope: every unique address once, in first-seen order,
        // including bcc.
        assert_eq!(
            transcript.rcpt_lines(),
            [
                "RCPT TO:<a@x.test>",
                "RCPT TO:<b@x.test>",
                "RCPT TO:<c@x.test>",
                "RCPT TO:<d@x.test>",
            ]
        );
        assert!(transcript.saw("MAIL FROM:<sender@x.test>"));

        // Headers: to and cc rendered, bcc absent.
        assert_eq!(
            transcript.payload,
            [
                "To: a@x.test, b@x.test",
                "Cc: b@x.test, c@x.test",
                "Subject: Hi",
                "",
                "Hello",
            ]
        );

        // The id is the digest of the composed bytes.
        let composed = ComposedMessage::compose(&request);
        assert_eq!(result.id, identity::message_id(&composed.raw));
    }

    #[tokio::test]
    async fn no_credentials_means_no_starttls_and_no_auth() {
        let server = ScriptedServer::spawn(None).await;
        let config = server.config();
        let request = SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test");

        send(&config, &request).await.unwrap();
        let transcript = server.transcript().await;

        assert!(!transcript.saw("STARTTLS"));
        assert!(!transcript.saw("AUTH"));
    }

    #[tokio::test]
    async fn recipient_rejection_aborts_before_data() {
        let server = ScriptedServer::spawn(Some(2)).await;
        let config = server.config();
        let request = SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test")
            .to("b@x.test")
            .to("c@x.test");

        let err = send(&config, &request).await.unwrap_err();
        assert!(
            matches!(err, DispatchError::Recipient { ref address, .. } if address == "b@x.test"),
            "unexpected error: {err}"
        );

        let transcript = server.transcript().await;
        // One accepted RCPT, then the rejected one; the third is never
        // attempted and the data phase is never opened.
        assert_eq!(
            transcript.rcpt_lines(),
            ["RCPT TO:<a@x.test>", "RCPT TO:<b@x.test>"]
        );
        assert!(!transcript.saw("DATA"));
    }

    #[tokio::test]
    async fn connection_failure_is_reported() {
        // Bind then drop to obtain a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ConnectionConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            credentials: None,
        };
        let request = SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test");

        let err = send(&config, &request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Connection(_)), "{err}");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_inflight_send() {
        // Accept the connection but never greet, so the pipeline blocks.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stall = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = ConnectionConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            credentials: None,
        };
        let request = SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test");

        let err = send_cancellable(&config, &request, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled));
        stall.abort();
    }

    #[tokio::test]
    async fn empty_to_is_rejected_before_connecting() {
        let config = ConnectionConfig {
            host: "smtp.invalid".into(),
            port: 25,
            credentials: None,
        };
        let request = SendRequest::new("Hi", "Hello").sender("sender@x.test");

        let err = send(&config, &request).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
    }

    #[test]
    fn sender_falls_back_to_configured_username() {
        let config = ConnectionConfig {
            host: "smtp.example.com".into(),
            port: 587,
            credentials: Some(Credentials {
                username: "user@example.com".into(),
                password: "secret".into(),
            }),
        };

        let explicit = SendRequest::new("s", "b").sender("sender@x.test").to("a@x");
        assert_eq!(
            resolve_sender(&config, &explicit).unwrap().as_str(),
            "sender@x.test"
        );

        let implicit = SendRequest::new("s", "b").to("a@x");
        assert_eq!(
            resolve_sender(&config, &implicit).unwrap().as_str(),
            "user@example.com"
        );

        // An empty `from` falls back too.
        let empty = SendRequest::new("s", "b").sender("").to("a@x");
        assert_eq!(
            resolve_sender(&config, &empty).unwrap().as_str(),
            "user@example.com"
        );
    }

    #[test]
    fn missing_sender_without_credentials_is_invalid() {
        let config = ConnectionConfig {
            host: "smtp.example.com".into(),
            port: 25,
            credentials: None,
        };
        let request = SendRequest::new("s", "b").to("a@x");
        let err = resolve_sender(&config, &request).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
    }
}
