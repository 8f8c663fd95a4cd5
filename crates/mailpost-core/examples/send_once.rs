//! Sends a single message using configuration from the environment.
//!
//! ```sh
//! SMTP_HOST=localhost SMTP_PORT=1025 SMTP_AUTHENTICATION=false \
//!     cargo run --example send_once
//! ```

use mailpost_core::{ConnectionConfig, SendMailResource, SendRequest};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ConnectionConfig::from_env()?;
    let resource = SendMailResource::new(config);

    let request = SendRequest::new("Hello from mailpost", "It works.")
        .sender("sender@example.com")
        .to("recipient@example.com");

    let state = resource.create(&request).await?;
    println!("sent, id = {}", state.id);

    Ok(())
}
