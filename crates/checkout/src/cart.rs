//! Cart state with local-remote reconciliation.
//!
//! The cart is a single-writer resource per session. Every mutation is
//! written to the local cache synchronously; writes to the remote store are
//! debounced and suppressed entirely until the initial reconciliation
//! completes, so a stale startup snapshot can never overwrite a remote cart
//! updated from another device.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, instrument, warn};

use verdant_core::{CustomerId, Money, ProductId};

use crate::models::{subtotal, CartLine};
use crate::services::{CatalogService, RemoteCartStore};

/// Quiet period before a burst of mutations is flushed to the remote store.
const REMOTE_WRITE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Synchronous device-local cart cache.
///
/// Survives page reloads for anonymous sessions. Implementations must not
/// block on network I/O.
pub trait LocalCartCache: Send + Sync {
    fn load(&self) -> Vec<CartLine>;
    fn store(&self, lines: &[CartLine]);
    fn clear(&self);
}

/// In-memory cache, used in tests and headless sessions.
#[derive(Default)]
pub struct InMemoryCartCache {
    lines: Mutex<Vec<CartLine>>,
}

impl LocalCartCache for InMemoryCartCache {
    fn load(&self) -> Vec<CartLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn store(&self, lines: &[CartLine]) {
        if let Ok(mut guard) = self.lines.lock() {
            *guard = lines.to_vec();
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.lines.lock() {
            guard.clear();
        }
    }
}

struct CartState {
    lines: Vec<CartLine>,
    customer: Option<CustomerId>,
    /// Remote writes stay suppressed until the first reconciliation.
    reconciled: bool,
    /// Bumped on every mutation; a debounced flush only fires if no newer
    /// mutation superseded it.
    generation: u64,
}

/// The authoritative cart for one checkout session.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartInner>,
}

struct CartInner {
    local: Arc<dyn LocalCartCache>,
    remote: Arc<dyn RemoteCartStore>,
    state: Mutex<CartState>,
    debounce: Duration,
}

impl CartStore {
    /// Create a store seeded from the local cache.
    #[must_use]
    pub fn new(local: Arc<dyn LocalCartCache>, remote: Arc<dyn RemoteCartStore>) -> Self {
        Self::with_debounce(local, remote, REMOTE_WRITE_DEBOUNCE)
    }

    /// Create a store with an explicit debounce window.
    #[must_use]
    pub fn with_debounce(
        local: Arc<dyn LocalCartCache>,
        remote: Arc<dyn RemoteCartStore>,
        debounce: Duration,
    ) -> Self {
        let lines = local.load();
        Self {
            inner: Arc::new(CartInner {
                local,
                remote,
                state: Mutex::new(CartState {
                    lines,
                    customer: None,
                    reconciled: false,
                    generation: 0,
                }),
                debounce,
            }),
        }
    }

    /// Current line items.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.lock().lines.clone()
    }

    /// Current subtotal.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        subtotal(&self.lock().lines)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    /// Add a line. An existing line for the same product has its quantity
    /// incremented instead of a duplicate appearing.
    pub fn add(&self, line: CartLine) {
        self.mutate(|lines| {
            match lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => existing.quantity += line.quantity,
                None => lines.push(line),
            }
        });
    }

    /// Adjust a line's quantity by `delta`, flooring at 1. Removing a line
    /// goes through [`CartStore::remove`], never through this path.
    pub fn update_quantity(&self, product: &ProductId, delta: i64) {
        self.mutate(|lines| {
            if let Some(line) = lines.iter_mut().find(|l| l.product_id == *product) {
                let new_quantity = i64::from(line.quantity).saturating_add(delta).max(1);
                line.quantity = u32::try_from(new_quantity).unwrap_or(1);
            }
        });
    }

    /// Remove a line entirely.
    pub fn remove(&self, product: &ProductId) {
        self.mutate(|lines| lines.retain(|l| l.product_id != *product));
    }

    /// Replace the whole cart, e.g. after clamping to available stock.
    pub fn replace(&self, new_lines: Vec<CartLine>) {
        self.mutate(|lines| *lines = new_lines);
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.mutate(Vec::clear);
    }

    /// Merge with the remote cart on identity change and adopt the result
    /// as the new state on both sides. Unblocks debounced remote writes.
    #[instrument(skip(self), fields(customer = %customer))]
    pub async fn reconcile(&self, customer: CustomerId) {
        let remote_lines = match self.inner.remote.get_cart(&customer).await {
            Ok(lines) => lines,
            Err(err) => {
                // Keep the local cart usable; remote writes stay suppressed
                // so the failed fetch cannot be overwritten blindly.
                warn!(error = %err, "remote cart fetch failed, skipping reconciliation");
                return;
            }
        };

        let merged = {
            let mut state = self.lock();
            let merged = merge_carts(&state.lines, &remote_lines);
            state.lines = merged.clone();
            state.customer = Some(customer.clone());
            state.reconciled = true;
            merged
        };
        self.inner.local.store(&merged);

        if let Err(err) = self.inner.remote.replace_cart(&customer, &merged).await {
            warn!(error = %err, "remote cart write-back failed");
        }
        debug!(lines = merged.len(), "cart reconciled");
    }

    /// Drop the remote association and wipe the local cache.
    pub fn sign_out(&self) {
        {
            let mut state = self.lock();
            state.lines.clear();
            state.customer = None;
            state.reconciled = false;
            state.generation += 1;
        }
        self.inner.local.clear();
    }

    /// Overwrite stale cached prices with live catalog values. Used for
    /// anonymous sessions on load, where no remote cart exists to win.
    #[instrument(skip_all)]
    pub async fn refresh_prices(&self, catalog: &dyn CatalogService) {
        let lines = self.lines();
        let mut refreshed = Vec::with_capacity(lines.len());
        for mut line in lines {
            match catalog.fetch_product(&line.product_id).await {
                Ok(product) => {
                    line.unit_price = product.price;
                    line.compare_at_price = product.compare_at_price;
                }
                Err(err) => {
                    warn!(product = %line.product_id, error = %err, "price refresh failed");
                }
            }
            refreshed.push(line);
        }

        {
            let mut state = self.lock();
            state.lines = refreshed.clone();
        }
        self.inner.local.store(&refreshed);
    }

    fn mutate(&self, f: impl FnOnce(&mut Vec<CartLine>)) {
        let (snapshot, flush) = {
            let mut state = self.lock();
            f(&mut state.lines);
            state.generation += 1;
            let flush = match (&state.customer, state.reconciled) {
                (Some(customer), true) => Some((state.generation, customer.clone())),
                _ => None,
            };
            (state.lines.clone(), flush)
        };

        self.inner.local.store(&snapshot);

        if let Some((generation, customer)) = flush {
            self.schedule_remote_write(generation, customer);
        }
    }

    /// Flush to the remote store after a quiet period, unless a newer
    /// mutation arrives first.
    fn schedule_remote_write(&self, generation: u64, customer: CustomerId) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let snapshot = {
                let Ok(state) = inner.state.lock() else {
                    return;
                };
                if state.generation != generation || state.customer.as_ref() != Some(&customer) {
                    return;
                }
                state.lines.clone()
            };
            if let Err(err) = inner.remote.replace_cart(&customer, &snapshot).await {
                warn!(error = %err, "debounced remote cart write failed");
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartState> {
        // Lock poisoning cannot leave the cart in a torn state; every
        // critical section completes without panicking paths.
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Merge a local cart with the remote persisted cart.
///
/// Tie-break rules: a product present in both keeps the remote line (live
/// catalog pricing wins) with `quantity = max(local, remote)`; products
/// present only locally are appended unchanged. Every product appears
/// exactly once, remote ordering first.
#[must_use]
pub fn merge_carts(local: &[CartLine], remote: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = remote
        .iter()
        .map(|remote_line| {
            let mut line = remote_line.clone();
            if let Some(local_line) = local.iter().find(|l| l.product_id == line.product_id) {
                line.quantity = line.quantity.max(local_line.quantity);
            }
            line
        })
        .collect();

    for local_line in local {
        if !merged.iter().any(|l| l.product_id == local_line.product_id) {
            merged.push(local_line.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use crate::models::FulfillmentConstraint;
    use crate::services::{CatalogProduct, MockCatalogService, MockRemoteCartStore};

    use super::*;

    fn line(product: &str, price: Money, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product),
            name: product.to_owned(),
            unit_price: price,
            compare_at_price: None,
            quantity,
            category: "seedlings".to_owned(),
            constraint: FulfillmentConstraint::Either,
            seedlings_per_unit: 1,
        }
    }

    fn store_with_remote(remote: MockRemoteCartStore) -> CartStore {
        CartStore::with_debounce(
            Arc::new(InMemoryCartCache::default()),
            Arc::new(remote),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn test_merge_identical_carts_is_identity() {
        let cart = vec![
            line("basil", Money::from_cents(400), 2),
            line("thyme", Money::from_cents(350), 1),
        ];
        assert_eq!(merge_carts(&cart, &cart), cart);
    }

    #[test]
    fn test_merge_remote_price_wins_max_quantity_wins() {
        let local = vec![line("basil", Money::from_cents(400), 5)];
        let remote = vec![line("basil", Money::from_cents(325), 2)];

        let merged = merge_carts(&local, &remote);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].unit_price, Money::from_cents(325));
        assert_eq!(merged[0].quantity, 5);
    }

    #[test]
    fn test_merge_keeps_local_only_lines_after_remote() {
        let local = vec![line("mint", Money::from_cents(200), 1)];
        let remote = vec![line("basil", Money::from_cents(400), 1)];

        let merged = merge_carts(&local, &remote);
        assert_eq!(merged[0].product_id, ProductId::new("basil"));
        assert_eq!(merged[1].product_id, ProductId::new("mint"));
    }

    #[test]
    fn test_add_increments_existing_line() {
        let store = store_with_remote(MockRemoteCartStore::new());
        store.add(line("basil", Money::from_cents(400), 2));
        store.add(line("basil", Money::from_cents(400), 3));

        let lines = store.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 5);
    }

    #[test]
    fn test_update_quantity_floors_at_one() {
        let store = store_with_remote(MockRemoteCartStore::new());
        store.add(line("basil", Money::from_cents(400), 2));

        store.update_quantity(&ProductId::new("basil"), -10);
        assert_eq!(store.lines()[0].quantity, 1);

        store.update_quantity(&ProductId::new("basil"), 3);
        assert_eq!(store.lines()[0].quantity, 4);
    }

    #[test]
    fn test_remove_drops_line() {
        let store = store_with_remote(MockRemoteCartStore::new());
        store.add(line("basil", Money::from_cents(400), 2));
        store.remove(&ProductId::new("basil"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remote_writes_suppressed_before_reconciliation() {
        let mut remote = MockRemoteCartStore::new();
        remote.expect_replace_cart().times(0);

        let store = store_with_remote(remote);
        store.add(line("basil", Money::from_cents(400), 1));
        store.update_quantity(&ProductId::new("basil"), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        // Mock drop verifies replace_cart never fired.
    }

    #[tokio::test]
    async fn test_debounce_collapses_burst_into_one_write() {
        let mut remote = MockRemoteCartStore::new();
        remote.expect_get_cart().returning(|_| Ok(Vec::new()));
        // One write from reconciliation write-back, one from the burst.
        remote.expect_replace_cart().times(2).returning(|_, _| Ok(()));

        let store = store_with_remote(remote);
        store.reconcile(CustomerId::new("cust_1")).await;

        store.add(line("basil", Money::from_cents(400), 1));
        store.add(line("mint", Money::from_cents(200), 1));
        store.update_quantity(&ProductId::new("mint"), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_reconcile_adopts_merge_and_writes_back() {
        let mut remote = MockRemoteCartStore::new();
        remote
            .expect_get_cart()
            .returning(|_| Ok(vec![line("basil", Money::from_cents(325), 1)]));
        remote
            .expect_replace_cart()
            .withf(|_, lines| lines.len() == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let store = store_with_remote(remote);
        store.add(line("basil", Money::from_cents(400), 2));
        store.add(line("mint", Money::from_cents(200), 1));
        store.reconcile(CustomerId::new("cust_1")).await;

        let lines = store.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].unit_price, Money::from_cents(325));
        assert_eq!(lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_sign_out_wipes_local_cache() {
        let local = Arc::new(InMemoryCartCache::default());
        let store = CartStore::with_debounce(
            local.clone(),
            Arc::new(MockRemoteCartStore::new()),
            Duration::from_millis(1),
        );
        store.add(line("basil", Money::from_cents(400), 2));
        assert!(!local.load().is_empty());

        store.sign_out();
        assert!(store.is_empty());
        assert!(local.load().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_prices_overwrites_stale_values() {
        let mut catalog = MockCatalogService::new();
        catalog.expect_fetch_product().returning(|_| {
            Ok(CatalogProduct {
                price: Money::from_cents(300),
                compare_at_price: Some(Money::from_cents(400)),
                available_quantity: 10,
            })
        });

        let store = store_with_remote(MockRemoteCartStore::new());
        store.add(line("basil", Money::from_cents(400), 2));
        store.refresh_prices(&catalog).await;

        let lines = store.lines();
        assert_eq!(lines[0].unit_price, Money::from_cents(300));
        assert_eq!(lines[0].compare_at_price, Some(Money::from_cents(400)));
    }
}
