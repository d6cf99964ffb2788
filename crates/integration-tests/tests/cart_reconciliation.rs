//! Cross-device cart behavior against the fake remote store.

use std::time::Duration;

use verdant_core::{CustomerId, Money, ProductId};

use verdant_integration_tests::{seedling_line, TestHarness};

#[tokio::test]
async fn test_remote_writes_stay_suppressed_until_reconciliation() {
    let harness = TestHarness::new();
    let cart = harness.cart();

    cart.add(seedling_line("basil", 400, 1));
    cart.add(seedling_line("mint", 200, 2));
    cart.update_quantity(&ProductId::new("mint"), 1);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(harness.remote_cart.replace_calls(), 0);
}

#[tokio::test]
async fn test_reconcile_merges_and_adopts_remote_pricing() {
    let harness = TestHarness::new();
    harness.remote_cart.seed(
        "cust_1",
        vec![seedling_line("basil", 325, 1), seedling_line("thyme", 350, 1)],
    );

    let cart = harness.cart();
    cart.add(seedling_line("basil", 400, 3));
    cart.add(seedling_line("mint", 200, 1));

    cart.reconcile(CustomerId::new("cust_1")).await;

    let lines = cart.lines();
    assert_eq!(lines.len(), 3);
    // Remote lines first, remote price wins, max quantity wins.
    assert_eq!(lines[0].product_id, ProductId::new("basil"));
    assert_eq!(lines[0].unit_price, Money::from_cents(325));
    assert_eq!(lines[0].quantity, 3);
    assert_eq!(lines[1].product_id, ProductId::new("thyme"));
    // Local-only line appended after.
    assert_eq!(lines[2].product_id, ProductId::new("mint"));

    // Write-back persisted the merge immediately.
    let stored = harness.remote_cart.stored("cust_1");
    assert_eq!(stored, lines);
}

#[tokio::test]
async fn test_burst_after_reconcile_flushes_once() {
    let harness = TestHarness::new();
    let cart = harness.cart();
    cart.reconcile(CustomerId::new("cust_1")).await;
    let after_reconcile = harness.remote_cart.replace_calls();

    cart.add(seedling_line("basil", 400, 1));
    cart.add(seedling_line("mint", 200, 1));
    cart.update_quantity(&ProductId::new("basil"), 2);
    cart.remove(&ProductId::new("mint"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.remote_cart.replace_calls(), after_reconcile + 1);

    let stored = harness.remote_cart.stored("cust_1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].product_id, ProductId::new("basil"));
    assert_eq!(stored[0].quantity, 3);
}

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let harness = TestHarness::new();
    harness
        .remote_cart
        .seed("cust_1", vec![seedling_line("basil", 325, 2)]);

    let cart = harness.cart();
    cart.add(seedling_line("basil", 400, 2));

    cart.reconcile(CustomerId::new("cust_1")).await;
    let first = cart.lines();
    cart.reconcile(CustomerId::new("cust_1")).await;
    assert_eq!(cart.lines(), first);
}

#[tokio::test]
async fn test_sign_out_stops_remote_flushes() {
    let harness = TestHarness::new();
    let cart = harness.cart();
    cart.reconcile(CustomerId::new("cust_1")).await;
    let after_reconcile = harness.remote_cart.replace_calls();

    cart.add(seedling_line("basil", 400, 1));
    cart.sign_out();

    tokio::time::sleep(Duration::from_millis(50)).await;
    // The in-flight debounced write was superseded by the sign-out.
    assert_eq!(harness.remote_cart.replace_calls(), after_reconcile);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn test_anonymous_refresh_adopts_live_catalog_prices() {
    let harness = TestHarness::new();
    harness.catalog.insert("basil", 300, 10);

    let cart = harness.cart();
    cart.add(seedling_line("basil", 400, 2));
    cart.refresh_prices(harness.context.services().catalog.as_ref())
        .await;

    assert_eq!(cart.lines()[0].unit_price, Money::from_cents(300));
    assert_eq!(cart.subtotal(), Money::from_cents(600));
}
