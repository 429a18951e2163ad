//! # HTTP Mailer
//!
//! Transactional email over a JSON mail API:
//! `POST {api_url}` `{from, to, subject, html, text}` → `{id}`.

use crate::client::upstream_message;
use crate::config::MailConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shop_core::{EmailMessage, Mailer, ShopError, ShopResult};
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Mailer backed by a transactional mail API
pub struct HttpMailer {
    client: Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(client: Client, config: MailConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    async fn send(&self, message: &EmailMessage) -> ShopResult<String> {
        let payload = SendRequest {
            from: &self.config.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ShopError::Mail(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::Mail(e.to_string()))?;

        if !status.is_success() {
            error!("Mail API error: status={}, body={}", status, body);
            return Err(ShopError::Mail(format!(
                "HTTP {}: {}",
                status,
                upstream_message(&body)
            )));
        }

        let sent: SendResponse = serde_json::from_str(&body)
            .map_err(|e| ShopError::Mail(format!("Unexpected mail API response: {}", e)))?;

        info!("Sent email: id={}", sent.id);
        Ok(sent.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer(server: &MockServer) -> HttpMailer {
        HttpMailer::new(
            Client::new(),
            MailConfig {
                api_url: format!("{}/emails", server.uri()),
                api_key: "re_test".into(),
                from: "shop@example.com".into(),
            },
        )
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to: "buyer@example.com".into(),
            subject: "Your receipt".into(),
            html: "<p>Thanks</p>".into(),
            text: "Thanks".into(),
        }
    }

    #[tokio::test]
    async fn test_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("Authorization", "Bearer re_test"))
            .and(body_json(json!({
                "from": "shop@example.com",
                "to": ["buyer@example.com"],
                "subject": "Your receipt",
                "html": "<p>Thanks</p>",
                "text": "Thanks"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_123" })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(mailer(&server).send(&message()).await.unwrap(), "msg_123");
    }

    #[tokio::test]
    async fn test_rejected_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "message": "Invalid `to` field" })),
            )
            .mount(&server)
            .await;

        let err = mailer(&server).send(&message()).await.unwrap_err();
        match err {
            ShopError::Mail(message) => assert!(message.contains("Invalid `to` field")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
