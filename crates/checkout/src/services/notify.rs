//! Transactional email via the platform's notification endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;

use verdant_core::Email;

use crate::config::PlatformConfig;
use crate::models::OrderConfirmation;
use crate::services::{NotificationService, ServiceError};

/// Sends order confirmation emails.
#[derive(Clone)]
pub struct EmailNotifier {
    inner: Arc<EmailNotifierInner>,
}

struct EmailNotifierInner {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct ConfirmationEmailBody<'a> {
    to: &'a Email,
    confirmation: &'a OrderConfirmation,
}

impl EmailNotifier {
    /// Create a new notifier.
    #[must_use]
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            inner: Arc::new(EmailNotifierInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                token: config.token.expose_secret().to_owned(),
            }),
        }
    }
}

#[async_trait]
impl NotificationService for EmailNotifier {
    #[instrument(skip_all, fields(order_number = %confirmation.order_number))]
    async fn send_order_confirmation(
        &self,
        email: &Email,
        confirmation: &OrderConfirmation,
    ) -> Result<(), ServiceError> {
        let response = self
            .inner
            .client
            .post(format!(
                "{}/notifications/order-confirmation",
                self.inner.base_url
            ))
            .bearer_auth(&self.inner.token)
            .json(&ConfirmationEmailBody {
                to: email,
                confirmation,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }
        Ok(())
    }
}
