//! Carrier rating API client.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::CarrierConfig;
use crate::models::{Address, AddressValidation, CartLine, PackageBreakdown, ShippingRateOption, ZoneInfo};
use crate::services::{CarrierService, RateQuote, ServiceError};
use crate::shipping::package_breakdown;

/// Client for the carrier rating API.
///
/// The carrier rates per physical package, so the cart's expanded
/// seedling-unit quantity is split into boxes before the request.
#[derive(Clone)]
pub struct CarrierClient {
    inner: Arc<CarrierClientInner>,
}

struct CarrierClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    seedlings_per_box: u32,
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    address: &'a Address,
}

#[derive(Serialize)]
struct RatesRequest<'a> {
    destination: &'a Address,
    packages: PackageBreakdown,
}

#[derive(Deserialize)]
struct RatesResponse {
    zone: ZoneInfo,
    rates: Vec<ShippingRateOption>,
}

#[derive(Deserialize)]
struct CarrierErrorBody {
    message: String,
}

impl CarrierClient {
    /// Create a new carrier client.
    #[must_use]
    pub fn new(config: &CarrierConfig, seedlings_per_box: u32) -> Self {
        Self {
            inner: Arc::new(CarrierClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                api_key: config.api_key.expose_secret().to_owned(),
                seedlings_per_box,
            }),
        }
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self
            .inner
            .client
            .post(format!("{}{path}", self.inner.base_url))
            .header("X-Api-Key", &self.inner.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<CarrierErrorBody>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |body| body.message);
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text)
            .map_err(|err| ServiceError::Parse(format!("{path}: {err}")))
    }
}

#[async_trait]
impl CarrierService for CarrierClient {
    #[instrument(skip_all, fields(state = %address.state))]
    async fn validate_address(&self, address: &Address) -> Result<AddressValidation, ServiceError> {
        self.post("/addresses/validate", &ValidateRequest { address })
            .await
    }

    #[instrument(skip_all, fields(state = %address.state, lines = lines.len()))]
    async fn fetch_rates(
        &self,
        address: &Address,
        lines: &[CartLine],
    ) -> Result<RateQuote, ServiceError> {
        let packages = package_breakdown(lines, self.inner.seedlings_per_box);
        let response: RatesResponse = self
            .post(
                "/rates",
                &RatesRequest {
                    destination: address,
                    packages,
                },
            )
            .await?;

        Ok(RateQuote {
            zone: response.zone,
            options: response.rates,
            packages,
        })
    }
}
