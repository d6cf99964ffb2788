//! Nursery platform API client.
//!
//! One REST client backs every platform-owned concern: catalog reads, the
//! persisted cart, promotion evaluation, order persistence, the seedling
//! credit ledger, pickup schedules, and abandoned-cart capture. Product
//! lookups are cached for 5 minutes; availability reads bypass the cache so
//! the pre-commit stock check always sees live numbers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use verdant_core::{CustomerId, Email, LocationId, Money, OrderId, ProductId, PromotionId};

use crate::config::PlatformConfig;
use crate::models::{
    CartLine, CreatedOrder, DiscountCandidate, OrderPatch, OrderSnapshot, PickupLocation,
    PickupSlot,
};
use crate::services::{
    AbandonedCartStore, CatalogProduct, CatalogService, CodeEvaluation, CreditLedger, OrderStore,
    PickupDirectory, PromotionEvaluator, RemoteCartStore, ServiceError,
};

const PRODUCT_CACHE_CAPACITY: u64 = 1000;
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Client for the platform REST API.
#[derive(Clone)]
pub struct PlatformClient {
    inner: Arc<PlatformClientInner>,
}

struct PlatformClientInner {
    client: reqwest::Client,
    base_url: String,
    token: String,
    product_cache: Cache<ProductId, CatalogProduct>,
}

impl PlatformClient {
    /// Create a new platform client.
    #[must_use]
    pub fn new(config: &PlatformConfig) -> Self {
        let product_cache = Cache::builder()
            .max_capacity(PRODUCT_CACHE_CAPACITY)
            .time_to_live(PRODUCT_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(PlatformClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                token: config.token.expose_secret().to_owned(),
                product_cache,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = self
            .inner
            .client
            .get(self.url(path))
            .bearer_auth(&self.inner.token)
            .send()
            .await?;
        Self::read_json(path, response).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let response = self
            .inner
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.inner.token)
            .json(body)
            .send()
            .await?;
        Self::read_json(path, response).await
    }

    /// Send a request whose response body carries no information.
    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<(), ServiceError> {
        let response = self
            .inner
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.inner.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(path.to_owned()));
        }
        if !status.is_success() {
            let text = response.text().await?;
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |body| body.error);
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(path.to_owned()));
        }

        // Body as text first for better error diagnostics.
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |body| body.error);
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text)
            .map_err(|err| ServiceError::Parse(format!("{path}: {err}")))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize, Deserialize)]
struct CartBody {
    lines: Vec<CartLine>,
}

#[derive(Serialize)]
struct AutoEvalBody<'a> {
    lines: &'a [CartLine],
    customer_id: Option<CustomerId>,
}

#[derive(Deserialize)]
struct AutoEvalResponse {
    candidate: Option<DiscountCandidate>,
}

#[derive(Serialize)]
struct CodeEvalBody<'a> {
    lines: &'a [CartLine],
    code: &'a str,
    customer_id: Option<CustomerId>,
}

#[derive(Serialize)]
struct UsageBody<'a> {
    order_id: &'a OrderId,
}

#[derive(Deserialize)]
struct LocationsResponse {
    locations: Vec<PickupLocation>,
}

#[derive(Deserialize)]
struct SlotsResponse {
    slots: Vec<PickupSlot>,
}

#[derive(Deserialize)]
struct AvailabilityResponse {
    available_quantity: u32,
}

#[derive(Serialize)]
struct VerifyCreditBody {
    customer_id: Option<CustomerId>,
}

#[derive(Deserialize)]
struct CreditBalanceResponse {
    balance: Money,
}

#[derive(Serialize)]
struct RedeemCreditBody<'a> {
    order_id: &'a OrderId,
    amount: Money,
}

#[derive(Serialize)]
struct AbandonedCartBody<'a> {
    email: &'a Email,
    lines: &'a [CartLine],
}

#[async_trait]
impl CatalogService for PlatformClient {
    #[instrument(skip(self), fields(product = %id))]
    async fn fetch_product(&self, id: &ProductId) -> Result<CatalogProduct, ServiceError> {
        if let Some(cached) = self.inner.product_cache.get(id).await {
            debug!("product cache hit");
            return Ok(cached);
        }

        let product: CatalogProduct = self.get(&format!("/products/{id}")).await?;
        self.inner
            .product_cache
            .insert(id.clone(), product.clone())
            .await;
        Ok(product)
    }

    #[instrument(skip(self), fields(product = %id))]
    async fn available_quantity(&self, id: &ProductId) -> Result<u32, ServiceError> {
        let response: AvailabilityResponse =
            self.get(&format!("/products/{id}/availability")).await?;
        Ok(response.available_quantity)
    }
}

#[async_trait]
impl RemoteCartStore for PlatformClient {
    #[instrument(skip(self), fields(customer = %customer))]
    async fn get_cart(&self, customer: &CustomerId) -> Result<Vec<CartLine>, ServiceError> {
        match self
            .get::<CartBody>(&format!("/customers/{customer}/cart"))
            .await
        {
            Ok(body) => Ok(body.lines),
            // No persisted cart yet is an empty cart, not a failure.
            Err(ServiceError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, lines), fields(customer = %customer, lines = lines.len()))]
    async fn replace_cart(
        &self,
        customer: &CustomerId,
        lines: &[CartLine],
    ) -> Result<(), ServiceError> {
        self
            .send_unit(
                reqwest::Method::PUT,
                &format!("/customers/{customer}/cart"),
                &CartBody {
                    lines: lines.to_vec(),
                },
            )
            .await
    }
}

#[async_trait]
impl PromotionEvaluator for PlatformClient {
    #[instrument(skip_all)]
    async fn evaluate_auto(
        &self,
        lines: &[CartLine],
        customer: Option<CustomerId>,
    ) -> Result<Option<DiscountCandidate>, ServiceError> {
        let response: AutoEvalResponse = self
            .send(
                reqwest::Method::POST,
                "/promotions/evaluate-auto",
                &AutoEvalBody {
                    lines,
                    customer_id: customer,
                },
            )
            .await?;
        Ok(response.candidate)
    }

    #[instrument(skip_all, fields(code))]
    async fn evaluate_code(
        &self,
        lines: &[CartLine],
        code: &str,
        customer: Option<CustomerId>,
    ) -> Result<CodeEvaluation, ServiceError> {
        self.send(
            reqwest::Method::POST,
            "/promotions/evaluate-code",
            &CodeEvalBody {
                lines,
                code,
                customer_id: customer,
            },
        )
        .await
    }

    #[instrument(skip(self), fields(promotion = %promotion, order = %order))]
    async fn record_usage(
        &self,
        promotion: &PromotionId,
        order: &OrderId,
    ) -> Result<(), ServiceError> {
        self
            .send_unit(
                reqwest::Method::POST,
                &format!("/promotions/{promotion}/usages"),
                &UsageBody { order_id: order },
            )
            .await
    }
}

#[async_trait]
impl PickupDirectory for PlatformClient {
    #[instrument(skip(self))]
    async fn list_locations(&self) -> Result<Vec<PickupLocation>, ServiceError> {
        let response: LocationsResponse = self.get("/pickup/locations").await?;
        Ok(response.locations)
    }

    #[instrument(skip(self), fields(location = %location))]
    async fn list_slots(
        &self,
        location: &LocationId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PickupSlot>, ServiceError> {
        let response: SlotsResponse = self
            .get(&format!(
                "/pickup/locations/{location}/slots?from={from}&to={to}"
            ))
            .await?;
        Ok(response.slots)
    }
}

#[async_trait]
impl OrderStore for PlatformClient {
    #[instrument(skip_all, fields(session = %snapshot.session_key))]
    async fn create_order(&self, snapshot: &OrderSnapshot) -> Result<CreatedOrder, ServiceError> {
        self.send(reqwest::Method::POST, "/orders", snapshot).await
    }

    #[instrument(skip(self, patch), fields(order = %id))]
    async fn update_order(&self, id: &OrderId, patch: OrderPatch) -> Result<(), ServiceError> {
        self
            .send_unit(reqwest::Method::PATCH, &format!("/orders/{id}"), &patch)
            .await
    }
}

#[async_trait]
impl CreditLedger for PlatformClient {
    #[instrument(skip_all)]
    async fn verify(
        &self,
        code: &str,
        customer: Option<CustomerId>,
    ) -> Result<Money, ServiceError> {
        let response: CreditBalanceResponse = self
            .send(
                reqwest::Method::POST,
                &format!("/credits/{code}/verify"),
                &VerifyCreditBody {
                    customer_id: customer,
                },
            )
            .await?;
        Ok(response.balance)
    }

    #[instrument(skip_all, fields(order = %order))]
    async fn redeem(&self, code: &str, order: &OrderId, amount: Money) -> Result<(), ServiceError> {
        self
            .send_unit(
                reqwest::Method::POST,
                &format!("/credits/{code}/redemptions"),
                &RedeemCreditBody {
                    order_id: order,
                    amount,
                },
            )
            .await
    }
}

#[async_trait]
impl AbandonedCartStore for PlatformClient {
    #[instrument(skip_all, fields(session = session_key))]
    async fn upsert_snapshot(
        &self,
        session_key: &str,
        email: &Email,
        lines: &[CartLine],
    ) -> Result<(), ServiceError> {
        self
            .send_unit(
                reqwest::Method::PUT,
                &format!("/abandoned-carts/{session_key}"),
                &AbandonedCartBody { email, lines },
            )
            .await
    }
}
