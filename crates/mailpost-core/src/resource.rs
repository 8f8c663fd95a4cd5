//! Declarative send-mail resource lifecycle.

use crate::config::ConnectionConfig;
use crate::dispatch::{self, SendResult};
use crate::error::Result;
use crate::message::SendRequest;

/// A declarative "this mail has been sent" resource.
///
/// Create and update both perform a real delivery; update is "send again",
/// not a diff. Read and delete are no-ops: SMTP offers no queryable or
/// deletable server-side resource, so the stored [`SendResult`] can never
/// drift and sent mail cannot be recalled.
///
/// The identifier in the returned state is derived from the composed
/// message bytes, so applying the same definition twice yields the same id
/// even though each apply sends real mail.
#[derive(Debug, Clone)]
pub struct SendMailResource {
    config: ConnectionConfig,
}

impl SendMailResource {
    /// Creates a resource handle over a connection configuration.
    #[must_use]
    pub const fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Returns the connection configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sends the message and returns its content-derived state.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or any delivery step fails.
    pub async fn create(&self, request: &SendRequest) -> Result<SendResult> {
        let result = dispatch::send(&self.config, request).await?;
        tracing::info!(id = %result.id, "send_mail resource created");
        Ok(result)
    }

    /// Re-sends the message to reflect an updated definition.
    ///
    /// The whole message is delivered again; nothing is diffed against the
    /// previous state.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or any delivery step fails.
    pub async fn update(&self, request: &SendRequest) -> Result<SendResult> {
        let result = dispatch::send(&self.config, request).await?;
        tracing::info!(id = %result.id, "send_mail resource updated");
        Ok(result)
    }

    /// Refreshes the stored state.
    ///
    /// A sent message cannot be observed after the fact, so the state comes
    /// back unchanged and no network traffic occurs.
    #[must_use]
    pub fn read(&self, current: SendResult) -> SendResult {
        tracing::debug!(id = %current.id, "read is a no-op for sent mail");
        current
    }

    /// Deletes the resource.
    ///
    /// Sent mail cannot be recalled; the state is simply discarded and no
    /// network traffic occurs.
    pub fn delete(&self, current: SendResult) {
        tracing::debug!(id = %current.id, "delete is a no-op for sent mail");
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
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Minimal SMTP responder: accepts `sessions` deliveries, agreeing to
    /// everything.
    async fn accept_all_server(sessions: usize) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for _ in 0..sessions {
                let (stream, _) = listener.accept().await.unwrap();
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                write_half.write_all(b"220 ok ESMTP\r\n").await.unwrap();

                let mut line = String::new();
                let mut in_data = false;
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await.unwrap() == 0 {
                        break;
                    }
                    let trimmed = line.trim_end();
                    if in_data {
                        if trimmed == "." {
                            in_data = false;
                            write_half.write_all(b"250 accepted\r\n").await.unwrap();
                        }
                    } else if trimmed == "DATA" {
                        in_data = true;
                        write_half.write_all(b"354 go ahead\r\n").await.unwrap();
                    } else if trimmed == "QUIT" {
                        write_half.write_all(b"221 bye\r\n").await.unwrap();
                        break;
                    } else {
                        write_half.write_all(b"250 OK\r\n").await.unwrap();
                    }
                }
            }
        });
        addr
    }

    fn request() -> SendRequest {
        SendRequest::new("Hi", "Hello")
            .sender("sender@x.test")
            .to("a@x.test")
    }

    #[tokio::test]
    async fn create_then_update_yield_the_same_id() {
        let addr = accept_all_server(2).await;
        let resource = SendMailResource::new(ConnectionConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            credentials: None,
        });

        let created = resource.create(&request()).await.unwrap();
        let updated = resource.update(&request()).await.unwrap();
        assert_eq!(created.id, updated.id);
    }

    #[test]
    fn read_returns_state_unchanged_without_io() {
        // Unroutable config: read must never touch the network.
        let resource = SendMailResource::new(ConnectionConfig {
            host: "smtp.invalid".into(),
            port: 25,
            credentials: None,
        });

        let state = SendResult {
            id: "d41d8cd98f00b204e9800998ecf8427e".into(),
        };
        let read_back = resource.read(state.clone());
        assert_eq!(read_back, state);
    }

    #[test]
    fn delete_is_a_no_op() {
        let resource = SendMailResource::new(ConnectionConfig {
            host: "smtp.invalid".into(),
            port: 25,
            credentials: None,
        });

        resource.delete(SendResult {
            id: "d41d8cd98f00b204e9800998ecf8427e".into(),
        });
    }
}
