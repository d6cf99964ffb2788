//! Stripe payment gateway client.
//!
//! Talks to the Stripe REST API directly: form-encoded requests, amounts
//! in cents. Card collection and 3DS happen in the hosted payment element;
//! this client only creates intents and reads back their status.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use verdant_core::{Money, OrderId};

use crate::services::{ConfirmOutcome, PaymentGateway, PaymentIntent, ServiceError};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Client for the Stripe payment intents API.
#[derive(Clone)]
pub struct StripeGateway {
    inner: Arc<StripeGatewayInner>,
}

struct StripeGatewayInner {
    client: reqwest::Client,
    secret_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    message: String,
}

impl StripeGateway {
    /// Create a gateway. A missing key is allowed so payment-disabled
    /// deployments can still build the wiring; any call then fails.
    #[must_use]
    pub fn new(secret_key: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(StripeGatewayInner {
                client: reqwest::Client::new(),
                secret_key,
            }),
        }
    }

    fn key(&self) -> Result<&str, ServiceError> {
        self.inner
            .secret_key
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .ok_or_else(|| ServiceError::Api {
                status: 500,
                message: "Stripe secret key not configured".to_owned(),
            })
    }

    async fn read_intent(response: reqwest::Response) -> Result<IntentResponse, ServiceError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorEnvelope>(&text).map_or_else(
                |_| text.chars().take(200).collect(),
                |envelope| envelope.error.message,
            );
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text)
            .map_err(|err| ServiceError::Parse(format!("payment_intents: {err}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self), fields(order = %order, amount = %amount))]
    async fn create_intent(
        &self,
        amount: Money,
        order: &OrderId,
        session_key: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let key = self.key()?.to_owned();
        let cents = amount.to_cents().to_string();
        let form = [
            ("amount", cents.as_str()),
            ("currency", "usd"),
            ("automatic_payment_methods[enabled]", "true"),
            ("metadata[order_id]", order.as_str()),
            ("metadata[session_key]", session_key),
        ];

        let response = self
            .inner
            .client
            .post(format!("{STRIPE_API_BASE}/payment_intents"))
            .basic_auth(&key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        let intent = Self::read_intent(response).await?;
        Ok(PaymentIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn await_confirmation(&self, intent_id: &str) -> Result<ConfirmOutcome, ServiceError> {
        let key = self.key()?.to_owned();
        let response = self
            .inner
            .client
            .get(format!("{STRIPE_API_BASE}/payment_intents/{intent_id}"))
            .basic_auth(&key, None::<&str>)
            .send()
            .await?;

        let intent = Self::read_intent(response).await?;
        Ok(match intent.status.as_str() {
            "succeeded" => ConfirmOutcome::Succeeded,
            "requires_action" | "requires_confirmation" => ConfirmOutcome::RequiresAction,
            other => ConfirmOutcome::Error {
                message: format!("payment not completed (status: {other})"),
            },
        })
    }
}
