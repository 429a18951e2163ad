//! # Mail
//!
//! Outbound email contract and the two templates the shop sends:
//! purchase receipts and password-reset links.

use crate::currency::Currency;
use crate::downloads::DownloadLink;
use crate::error::ShopResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Mail delivery service
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the message, returning the provider's message id
    async fn send(&self, message: &EmailMessage) -> ShopResult<String>;
}

/// Type alias for a shared mailer (dynamic dispatch)
pub type BoxedMailer = Arc<dyn Mailer>;

/// Mailer that only logs. Used when no mail API is configured.
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, message: &EmailMessage) -> ShopResult<String> {
        let message_id = format!("logged_{}", uuid::Uuid::new_v4().simple());
        info!(
            to = %message.to,
            subject = %message.subject,
            message_id = %message_id,
            "Mail delivery disabled, email not sent"
        );
        Ok(message_id)
    }
}

/// Receipt for a completed purchase, listing its download links
pub fn receipt_email(
    to: &str,
    session_id: &str,
    amount_total: Option<i64>,
    currency: Currency,
    links: &[DownloadLink],
) -> EmailMessage {
    let total = amount_total
        .map(|a| currency.display(a))
        .unwrap_or_else(|| "-".to_string());

    let mut text = format!(
        "Thanks for your purchase!\n\nOrder: {}\nTotal: {}\n",
        session_id, total
    );
    let mut html = format!(
        "<h1>Thanks for your purchase!</h1>\
         <p>Order: <code>{}</code><br>Total: {}</p>",
        escape_html(session_id),
        escape_html(&total)
    );

    if !links.is_empty() {
        text.push_str("\nYour downloads:\n");
        html.push_str("<p>Your downloads:</p><ul>");
        for link in links {
            text.push_str(&format!(
                "- {}: {} (valid until {})\n",
                link.product_id,
                link.url,
                link.expires_at.to_rfc3339()
            ));
            html.push_str(&format!(
                "<li><a href=\"{}\">{}</a> (valid until {})</li>",
                escape_html(&link.url),
                escape_html(&link.product_id),
                link.expires_at.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        html.push_str("</ul>");
    }

    EmailMessage {
        to: to.to_string(),
        subject: "Your receipt".to_string(),
        html,
        text,
    }
}

/// Password-reset email carrying a one-time link
pub fn password_reset_email(to: &str, reset_url: &str, expires_at: DateTime<Utc>) -> EmailMessage {
    let expiry = expires_at.format("%Y-%m-%d %H:%M UTC");
    EmailMessage {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text: format!(
            "Someone asked to reset the password for this address.\n\n\
             Reset it here: {}\n\nThe link expires at {}. \
             If this wasn't you, ignore this email.\n",
            reset_url, expiry
        ),
        html: format!(
            "<p>Someone asked to reset the password for this address.</p>\
             <p><a href=\"{}\">Reset your password</a></p>\
             <p>The link expires at {}. If this wasn't you, ignore this email.</p>",
            escape_html(reset_url),
            expiry
        ),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_lists_links() {
        let links = vec![DownloadLink {
            product_id: "ebook".into(),
            url: "https://files.test/products/ebook?token=a&b".into(),
            expires_at: Utc::now(),
        }];
        let email = receipt_email("buyer@example.com", "cs_1", Some(1999), Currency::USD, &links);

        assert_eq!(email.to, "buyer@example.com");
        assert!(email.text.contains("$19.99"));
        assert!(email.text.contains("https://files.test/products/ebook?token=a&b"));
        assert!(email.html.contains("token=a&amp;b"));
    }

    #[test]
    fn test_receipt_without_links() {
        let email = receipt_email("buyer@example.com", "cs_1", None, Currency::USD, &[]);
        assert!(!email.text.contains("downloads"));
        assert!(email.text.contains("Total: -"));
    }

    #[test]
    fn test_password_reset_email() {
        let email = password_reset_email(
            "user@example.com",
            "https://shop.test/reset-password?token=abc",
            Utc::now(),
        );
        assert_eq!(email.subject, "Reset your password");
        assert!(email.text.contains("https://shop.test/reset-password?token=abc"));
    }

    #[tokio::test]
    async fn test_logging_mailer() {
        let email = password_reset_email("user@example.com", "https://x", Utc::now());
        let id = LoggingMailer.send(&email).await.unwrap();
        assert!(id.starts_with("logged_"));
    }
}
