//! Integration tests for the order placement workflow on in-memory stores.
//!
//! Tests: OrderRequest → OrderPlacementService → UnitOfWork → InMemoryDatabase
//!
//! Verifies:
//! - Line items snapshot prices and requested quantities
//! - Stock is decremented exactly once per successful placement
//! - A failed order write leaves stock untouched
//! - Concurrent placements never oversell a shared product

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use tokio::sync::Barrier;

    use orderdesk_core::{CustomerId, Money, ProductId};
    use orderdesk_parties::{ContactInfo, Customer};
    use orderdesk_products::{Product, StockAdjustment};
    use orderdesk_sales::{
        CallContext, NewOrder, Order, OrderPlacementService, OrderRequest, OrderStore,
        PlaceOrderError, ProductStore, RequestedProduct, StoreError,
    };

    use crate::in_memory::{InMemoryDatabase, InMemoryTransaction};

    fn test_customer() -> Customer {
        let contact = ContactInfo {
            email: Some("ada@example.com".to_string()),
            phone: None,
        };
        Customer::new(CustomerId::new(), "Ada Lovelace", contact).unwrap()
    }

    fn test_product(name: &str, price: u64, quantity: u32) -> Product {
        Product::new(ProductId::new(), name, Money::from_minor_units(price), quantity).unwrap()
    }

    fn request(customer: &Customer, lines: &[(ProductId, u32)]) -> OrderRequest {
        OrderRequest::new(
            customer.id_typed().to_string(),
            lines
                .iter()
                .map(|(id, qty)| RequestedProduct::new(*id, *qty))
                .collect(),
        )
    }

    async fn stock_of(db: &InMemoryDatabase, id: ProductId) -> u32 {
        db.product(id).await.map(|p| p.quantity()).unwrap_or_default()
    }

    /// Seeds one customer and two products: (price 250, stock 10) and (price 1000, stock 4).
    async fn setup() -> (InMemoryDatabase, Customer, Product, Product) {
        orderdesk_observability::init();

        let db = InMemoryDatabase::new();
        let customer = test_customer();
        let pen = test_product("Pen", 250, 10);
        let lamp = test_product("Lamp", 1000, 4);
        db.insert_customer(customer.clone()).await;
        db.insert_product(pen.clone()).await;
        db.insert_product(lamp.clone()).await;
        (db, customer, pen, lamp)
    }

    #[tokio::test]
    async fn places_order_with_price_snapshots_and_decrements_stock() -> anyhow::Result<()> {
        let (db, customer, pen, lamp) = setup().await;
        let svc = db.placement_service();

        let order = svc
            .place_order(
                &CallContext::new(),
                request(&customer, &[(pen.id_typed(), 3), (lamp.id_typed(), 2)]),
            )
            .await?;

        let lines: Vec<(ProductId, Money, u32)> = order
            .line_items()
            .iter()
            .map(|l| (l.product_id, l.price, l.quantity))
            .collect();
        assert_eq!(
            lines,
            vec![
                (pen.id_typed(), Money::from_minor_units(250), 3),
                (lamp.id_typed(), Money::from_minor_units(1000), 2),
            ]
        );
        assert_eq!(order.customer().id_typed(), customer.id_typed());
        assert_eq!(order.total()?, Money::from_minor_units(2750));

        assert_eq!(stock_of(&db, pen.id_typed()).await, 7);
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 2);
        assert_eq!(db.orders().await, vec![order]);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_product_is_dropped_from_order() -> anyhow::Result<()> {
        let (db, customer, pen, _lamp) = setup().await;

        let order = db
            .placement_service()
            .place_order(
                &CallContext::new(),
                request(&customer, &[(pen.id_typed(), 4), (ProductId::new(), 9)]),
            )
            .await?;

        assert_eq!(order.line_items().len(), 1);
        assert_eq!(order.line_items()[0].product_id, pen.id_typed());
        assert_eq!(order.line_items()[0].quantity, 4);
        assert_eq!(stock_of(&db, pen.id_typed()).await, 6);
        Ok(())
    }

    #[tokio::test]
    async fn all_products_unknown_creates_nothing() {
        let (db, customer, pen, _lamp) = setup().await;
        let missing = ProductId::new();

        let err = db
            .placement_service()
            .place_order(&CallContext::new(), request(&customer, &[(missing, 1)]))
            .await
            .unwrap_err();

        assert_eq!(err, PlaceOrderError::ProductsNotFound(vec![missing]));
        assert!(db.orders().await.is_empty());
        assert_eq!(stock_of(&db, pen.id_typed()).await, 10);
    }

    #[tokio::test]
    async fn unknown_customer_touches_no_stock() {
        let (db, _customer, pen, _lamp) = setup().await;
        let stranger = test_customer();

        let err = db
            .placement_service()
            .place_order(&CallContext::new(), request(&stranger, &[(pen.id_typed(), 1)]))
            .await
            .unwrap_err();

        assert_eq!(err, PlaceOrderError::CustomerNotFound(stranger.id_typed()));
        assert_eq!(stock_of(&db, pen.id_typed()).await, 10);
        assert!(db.orders().await.is_empty());
    }

    #[tokio::test]
    async fn placement_is_not_idempotent() -> anyhow::Result<()> {
        let (db, customer, pen, _lamp) = setup().await;
        let svc = db.placement_service();
        let req = request(&customer, &[(pen.id_typed(), 2)]);

        let first = svc.place_order(&CallContext::new(), req.clone()).await?;
        let second = svc.place_order(&CallContext::new(), req).await?;

        assert_ne!(first.id_typed(), second.id_typed());
        assert_eq!(first.line_items(), second.line_items());
        assert_eq!(db.orders().await.len(), 2);
        assert_eq!(stock_of(&db, pen.id_typed()).await, 6);
        Ok(())
    }

    #[tokio::test]
    async fn later_price_change_does_not_alter_placed_order() -> anyhow::Result<()> {
        let (db, customer, pen, _lamp) = setup().await;

        let order = db
            .placement_service()
            .place_order(&CallContext::new(), request(&customer, &[(pen.id_typed(), 1)]))
            .await?;
        assert!(db.reprice(pen.id_typed(), Money::from_minor_units(9_999)).await);

        let stored = db.orders().await;
        assert_eq!(stored[0].id_typed(), order.id_typed());
        assert_eq!(stored[0].line_items()[0].price, Money::from_minor_units(250));
        Ok(())
    }

    #[tokio::test]
    async fn requesting_more_than_stock_fails_cleanly() {
        let (db, customer, pen, lamp) = setup().await;

        let err = db
            .placement_service()
            .place_order(
                &CallContext::new(),
                request(&customer, &[(pen.id_typed(), 1), (lamp.id_typed(), 5)]),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PlaceOrderError::InsufficientStock {
                product_id: lamp.id_typed(),
                requested: 5,
                available: 4,
            }
        );
        assert_eq!(stock_of(&db, pen.id_typed()).await, 10);
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 4);
    }

    /// Order store whose writes always fail after stock has been decremented.
    struct FailingOrders;

    #[async_trait]
    impl OrderStore<InMemoryTransaction> for FailingOrders {
        async fn create(
            &self,
            _tx: &mut InMemoryTransaction,
            _order: NewOrder,
        ) -> Result<Order, StoreError> {
            Err(StoreError::Unavailable("order table locked".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_order_write_leaves_stock_untouched() {
        let (db, customer, pen, lamp) = setup().await;
        let svc = OrderPlacementService::new(db.clone(), db.clone(), db.clone(), FailingOrders);

        let err = svc
            .place_order(
                &CallContext::new(),
                request(&customer, &[(pen.id_typed(), 3), (lamp.id_typed(), 1)]),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PlaceOrderError::Store(StoreError::Unavailable("order table locked".to_string()))
        );
        assert_eq!(stock_of(&db, pen.id_typed()).await, 10);
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 4);
        assert!(db.orders().await.is_empty());

        // The lock was released: a normal placement still goes through.
        db.placement_service()
            .place_order(&CallContext::new(), request(&customer, &[(pen.id_typed(), 1)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, pen.id_typed()).await, 9);
    }

    /// Order store whose writes never finish within a short deadline.
    struct StalledOrders;

    #[async_trait]
    impl OrderStore<InMemoryTransaction> for StalledOrders {
        async fn create(
            &self,
            _tx: &mut InMemoryTransaction,
            _order: NewOrder,
        ) -> Result<Order, StoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(StoreError::Unavailable("order write never completed".to_string()))
        }
    }

    #[tokio::test]
    async fn deadline_inside_unit_of_work_rolls_back() {
        let (db, customer, pen, lamp) = setup().await;
        let svc = OrderPlacementService::new(db.clone(), db.clone(), db.clone(), StalledOrders);
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));

        let err = svc
            .place_order(&ctx, request(&customer, &[(pen.id_typed(), 2), (lamp.id_typed(), 1)]))
            .await
            .unwrap_err();

        assert_eq!(err, PlaceOrderError::DeadlineExceeded);
        assert_eq!(stock_of(&db, pen.id_typed()).await, 10);
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 4);
        assert!(db.orders().await.is_empty());

        db.placement_service()
            .place_order(&CallContext::new(), request(&customer, &[(lamp.id_typed(), 1)]))
            .await
            .unwrap();
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 3);
        assert_eq!(db.orders().await.len(), 1);
    }

    /// Product store that holds every lookup until all contenders have read
    /// stock, so each of them passes the stock pre-check on the same snapshot.
    struct ContendedProducts {
        db: InMemoryDatabase,
        barrier: Barrier,
    }

    #[async_trait]
    impl ProductStore<InMemoryTransaction> for ContendedProducts {
        async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
            let found = self.db.find_all_by_id(ids).await?;
            self.barrier.wait().await;
            Ok(found)
        }

        async fn update_quantity(
            &self,
            tx: &mut InMemoryTransaction,
            adjustments: &[StockAdjustment],
        ) -> Result<(), StoreError> {
            self.db.update_quantity(tx, adjustments).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_orders_cannot_oversell_shared_product() {
        let (db, customer, _pen, lamp) = setup().await;
        let products = Arc::new(ContendedProducts {
            db: db.clone(),
            barrier: Barrier::new(2),
        });
        let svc = Arc::new(OrderPlacementService::new(
            db.clone(),
            db.clone(),
            products,
            db.clone(),
        ));

        // Stock is 4; each order wants 3.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let svc = Arc::clone(&svc);
            let req = request(&customer, &[(lamp.id_typed(), 3)]);
            handles.push(tokio::spawn(async move {
                svc.place_order(&CallContext::new(), req).await
            }));
        }

        let mut placed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(PlaceOrderError::InsufficientStock {
                    requested,
                    available,
                    ..
                }) => {
                    assert_eq!((requested, available), (3, 1));
                    rejected += 1;
                }
                Err(other) => panic!("unexpected placement error: {other:?}"),
            }
        }

        assert_eq!((placed, rejected), (1, 1));
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 1);
        assert_eq!(db.orders().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_concurrent_orders_sell_exactly_the_stock() {
        let (db, customer, _pen, lamp) = setup().await;
        let svc = Arc::new(db.placement_service());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let svc = Arc::clone(&svc);
            let req = request(&customer, &[(lamp.id_typed(), 1)]);
            handles.push(tokio::spawn(async move {
                svc.place_order(&CallContext::new(), req).await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(PlaceOrderError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected placement error: {other:?}"),
            }
        }

        assert_eq!(placed, 4);
        assert_eq!(stock_of(&db, lamp.id_typed()).await, 0);
        assert_eq!(db.orders().await.len(), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of placements, remaining stock plus the
        /// quantities on committed orders equals the initial stock.
        #[test]
        fn stock_plus_ordered_is_conserved(
            initial in 0u32..50,
            wants in prop::collection::vec(1u32..15, 1..12)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            let (remaining, ordered) = runtime.block_on(async {
                let db = InMemoryDatabase::new();
                let customer = test_customer();
                let product = test_product("Widget", 100, initial);
                let id = product.id_typed();
                db.insert_customer(customer.clone()).await;
                db.insert_product(product).await;

                let svc = db.placement_service();
                for want in wants {
                    let _ = svc
                        .place_order(&CallContext::new(), request(&customer, &[(id, want)]))
                        .await;
                }

                let ordered: u32 = db
                    .orders()
                    .await
                    .iter()
                    .flat_map(|o| o.line_items().iter().map(|l| l.quantity))
                    .sum();
                (stock_of(&db, id).await, ordered)
            });

            prop_assert_eq!(remaining + ordered, initial);
        }
    }
}
