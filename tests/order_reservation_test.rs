mod common;

use rust_decimal_macros::dec;
use stockledger::entities::inventory_reservation::ReservationStatus;
use stockledger::errors::ServiceError;
use stockledger::services::order_reservations::OrderLineReservationRequest;
use stockledger::units::UnitOfMeasure;
use uuid::Uuid;

fn line_request(
    tenant: Uuid,
    order: Uuid,
    product: Uuid,
    location: Uuid,
    quantity: rust_decimal::Decimal,
) -> OrderLineReservationRequest {
    OrderLineReservationRequest {
        tenant_id: tenant,
        order_id: order,
        order_line_id: Uuid::new_v4(),
        product_id: product,
        location_id: location,
        quantity,
        fallback_unit: UnitOfMeasure::Piece,
        ttl_seconds: None,
    }
}

#[tokio::test]
async fn order_line_with_recipe_reserves_every_component() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let kit = Uuid::new_v4();
    let bolt = Uuid::new_v4();
    let panel = Uuid::new_v4();

    core.bom
        .add_component(tenant, kit, bolt, dec!(8), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.bom
        .add_component(tenant, kit, panel, dec!(2), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.inventory
        .receive(bolt, location, tenant, dec!(100), None, None)
        .await
        .unwrap();
    core.inventory
        .receive(panel, location, tenant, dec!(10), None, None)
        .await
        .unwrap();

    let reserved = core
        .orders
        .reserve_for_order_line(line_request(tenant, order, kit, location, dec!(3)))
        .await
        .unwrap();
    assert_eq!(reserved.len(), 2);

    let bolts = core.inventory.snapshot(tenant, bolt, location).await.unwrap();
    let panels = core.inventory.snapshot(tenant, panel, location).await.unwrap();
    assert_eq!(bolts.available, dec!(76));
    assert_eq!(panels.available, dec!(4));
    // Holds are soft; nothing has left stock.
    assert_eq!(bolts.on_hand, dec!(100));
    assert_eq!(panels.on_hand, dec!(10));
}

#[tokio::test]
async fn order_line_without_recipe_reserves_the_product_itself() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(5), None, None)
        .await
        .unwrap();
    let reserved = core
        .orders
        .reserve_for_order_line(line_request(tenant, order, product, location, dec!(2)))
        .await
        .unwrap();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0].product_id, product);
    assert_eq!(reserved[0].quantity, dec!(2));
}

#[tokio::test]
async fn failed_component_leaves_earlier_holds_for_caller_cleanup() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let kit = Uuid::new_v4();
    let plentiful = Uuid::new_v4();
    let scarce = Uuid::new_v4();

    core.bom
        .add_component(tenant, kit, plentiful, dec!(1), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.bom
        .add_component(tenant, kit, scarce, dec!(5), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.inventory
        .receive(plentiful, location, tenant, dec!(50), None, None)
        .await
        .unwrap();
    core.inventory
        .receive(scarce, location, tenant, dec!(3), None, None)
        .await
        .unwrap();

    let err = core
        .orders
        .reserve_for_order_line(line_request(tenant, order, kit, location, dec!(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientInventory { .. }));

    // The first component's hold survived the failure.
    let listed = core.reservations.list_for_order(tenant, order).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].product_id, plentiful);
    assert_eq!(listed[0].status(), Some(ReservationStatus::Active));

    // Order-level release is the cleanup path.
    let released = core
        .orders
        .release_for_order(order, tenant, Some("partial reservation".into()))
        .await
        .unwrap();
    assert_eq!(released, 1);
    let snapshot = core.inventory.snapshot(tenant, plentiful, location).await.unwrap();
    assert_eq!(snapshot.available, dec!(50));
}

#[tokio::test]
async fn commit_for_order_deducts_every_component() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let kit = Uuid::new_v4();
    let bolt = Uuid::new_v4();
    let panel = Uuid::new_v4();

    core.bom
        .add_component(tenant, kit, bolt, dec!(4), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.bom
        .add_component(tenant, kit, panel, dec!(1), UnitOfMeasure::Piece)
        .await
        .unwrap();
    core.inventory
        .receive(bolt, location, tenant, dec!(20), None, None)
        .await
        .unwrap();
    core.inventory
        .receive(panel, location, tenant, dec!(5), None, None)
        .await
        .unwrap();

    core.orders
        .reserve_for_order_line(line_request(tenant, order, kit, location, dec!(2)))
        .await
        .unwrap();
    let committed = core.orders.commit_for_order(order, tenant).await.unwrap();
    assert_eq!(committed, 2);

    let bolts = core.inventory.snapshot(tenant, bolt, location).await.unwrap();
    let panels = core.inventory.snapshot(tenant, panel, location).await.unwrap();
    assert_eq!(bolts.on_hand, dec!(12));
    assert_eq!(panels.on_hand, dec!(3));
    assert_eq!(bolts.available, dec!(12));
    assert_eq!(panels.available, dec!(3));

    // Everything already committed; a second pass is a no-op.
    let committed = core.orders.commit_for_order(order, tenant).await.unwrap();
    assert_eq!(committed, 0);
}

#[tokio::test]
async fn release_for_order_skips_committed_reservations() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, location) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let product_a = Uuid::new_v4();
    let product_b = Uuid::new_v4();

    for product in [product_a, product_b] {
        core.inventory
            .receive(product, location, tenant, dec!(10), None, None)
            .await
            .unwrap();
        core.orders
            .reserve_for_order_line(line_request(tenant, order, product, location, dec!(3)))
            .await
            .unwrap();
    }

    // Commit one of the two holds directly.
    let listed = core.reservations.list_for_order(tenant, order).await.unwrap();
    core.reservations.commit(listed[0].id, tenant).await.unwrap();

    let released = core.orders.release_for_order(order, tenant, None).await.unwrap();
    assert_eq!(released, 1);

    let listed = core.reservations.list_for_order(tenant, order).await.unwrap();
    let statuses: Vec<_> = listed.iter().filter_map(|r| r.status()).collect();
    assert!(statuses.contains(&ReservationStatus::Committed));
    assert!(statuses.contains(&ReservationStatus::Released));
}
