use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::types::{NewsbriefError, RenderedDigest, Result};

/// Outbound delivery collaborator. One attempt per pass; failures are
/// reported to the caller and never retried here.
#[async_trait]
pub trait Deliver: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, digest: &RenderedDigest) -> Result<()>;
}

/// Email delivery through the SendGrid v3 API.
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    sender: String,
    recipient: String,
}

impl SendGridMailer {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        sender: String,
        recipient: String,
    ) -> Self {
        Self {
            client,
            api_key,
            sender,
            recipient,
        }
    }
}

#[async_trait]
impl Deliver for SendGridMailer {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        debug!(subject = %digest.subject, to = %self.recipient, "sending digest email");

        let payload = json!({
            "personalizations": [{ "to": [{ "email": &self.recipient }] }],
            "from": { "email": &self.sender },
            "subject": &digest.subject,
            "content": [{ "type": "text/plain", "value": &digest.body }]
        });

        self.client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NewsbriefError::Delivery(e.to_string()))?
            .error_for_status()
            .map_err(|e| NewsbriefError::Delivery(e.to_string()))?;

        info!(to = %self.recipient, "digest email sent");
        Ok(())
    }
}

/// Local fallback when no delivery credential is configured: print the
/// digest to standard output.
pub struct StdoutDelivery;

#[async_trait]
impl Deliver for StdoutDelivery {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn deliver(&self, digest: &RenderedDigest) -> Result<()> {
        println!("Subject: {}\n\n{}", digest.subject, digest.body);
        Ok(())
    }
}
