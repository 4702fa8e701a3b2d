mod common;

use rust_decimal_macros::dec;
use std::time::Duration;
use stockledger::entities::inventory_reservation::ReservationStatus;
use stockledger::entities::stock_movement::MovementKind;
use stockledger::errors::ServiceError;
use stockledger::services::ledger;
use stockledger::services::reservations::ReserveRequest;
use uuid::Uuid;

fn request(
    tenant: Uuid,
    order: Uuid,
    product: Uuid,
    location: Uuid,
    quantity: rust_decimal::Decimal,
) -> ReserveRequest {
    ReserveRequest {
        tenant_id: tenant,
        order_id: order,
        order_line_id: Uuid::new_v4(),
        product_id: product,
        location_id: location,
        quantity,
        ttl_seconds: None,
    }
}

#[tokio::test]
async fn reserve_reduces_available_but_not_on_hand() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    let reservation = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(4)))
        .await
        .unwrap();
    assert_eq!(reservation.status(), Some(ReservationStatus::Active));

    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.on_hand, dec!(10));
    assert_eq!(snapshot.available, dec!(6));
}

#[tokio::test]
async fn reserve_fails_when_available_is_insufficient() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    core.reservations
        .reserve(request(tenant, order, product, location, dec!(7)))
        .await
        .unwrap();

    // 3 available; asking for 4 fails even though 10 are physically on hand.
    let err = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(4)))
        .await
        .unwrap_err();
    match err {
        ServiceError::InsufficientInventory { available, requested } => {
            assert_eq!(available, dec!(3));
            assert_eq!(requested, dec!(4));
        }
        other => panic!("expected InsufficientInventory, got {other:?}"),
    }
}

#[tokio::test]
async fn reserve_rejects_non_positive_quantity() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let err = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidArgument(_)));
}

#[tokio::test]
async fn commit_deducts_on_hand_and_is_terminal() {
    let (core, db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    let reservation = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(4)))
        .await
        .unwrap();

    core.reservations.commit(reservation.id, tenant).await.unwrap();

    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.on_hand, dec!(6));
    assert_eq!(snapshot.available, dec!(6));

    let committed = core
        .reservations
        .get(reservation.id, tenant)
        .await
        .unwrap()
        .expect("reservation still readable");
    assert_eq!(committed.status(), Some(ReservationStatus::Committed));

    // The ledger carries the permanent deduction as a Sale row.
    let movements = ledger::movements_for_order(&*db, tenant, order).await.unwrap();
    let sale = movements
        .iter()
        .find(|m| m.kind() == Some(MovementKind::Sale))
        .expect("sale movement for committed reservation");
    assert_eq!(sale.quantity, dec!(-4));
    assert!(movements
        .iter()
        .any(|m| m.kind() == Some(MovementKind::ReservationCommit)));

    // A second commit finds the reservation no longer Active.
    let err = core
        .reservations
        .commit(reservation.id, tenant)
        .await
        .unwrap_err();
    match err {
        ServiceError::InvalidState { id, status } => {
            assert_eq!(id, reservation.id);
            assert_eq!(status, "committed");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }
    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.on_hand, dec!(6));
}

#[tokio::test]
async fn release_restores_availability_without_touching_on_hand() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    let reservation = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(4)))
        .await
        .unwrap();

    core.reservations
        .release(reservation.id, tenant, Some("customer cancelled".into()))
        .await
        .unwrap();

    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.on_hand, dec!(10));
    assert_eq!(snapshot.available, dec!(10));

    let released = core
        .reservations
        .get(reservation.id, tenant)
        .await
        .unwrap()
        .expect("reservation still readable");
    assert_eq!(released.status(), Some(ReservationStatus::Released));

    // Commit after release is rejected.
    let err = core
        .reservations
        .commit(reservation.id, tenant)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState { .. }));
}

#[tokio::test]
async fn lifecycle_operations_on_unknown_reservation_fail_with_not_found() {
    let (core, _db) = common::setup_core().await;
    let tenant = Uuid::new_v4();
    let missing = Uuid::new_v4();

    let err = core.reservations.commit(missing, tenant).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let err = core
        .reservations
        .release(missing, tenant, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn expiry_sweep_frees_only_overdue_reservations() {
    let (core, db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();

    let short_lived = core
        .reservations
        .reserve(ReserveRequest {
            ttl_seconds: Some(0),
            ..request(tenant, order, product, location, dec!(3))
        })
        .await
        .unwrap();
    let long_lived = core
        .reservations
        .reserve(ReserveRequest {
            ttl_seconds: Some(3600),
            ..request(tenant, order, product, location, dec!(2))
        })
        .await
        .unwrap();
    let open_ended = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(1)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let sweep = core.reservations.expire_due(Some(tenant)).await.unwrap();
    assert_eq!(sweep.expired_count, 1);

    let expired = core
        .reservations
        .get(short_lived.id, tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status(), Some(ReservationStatus::Expired));
    for id in [long_lived.id, open_ended.id] {
        let still_active = core.reservations.get(id, tenant).await.unwrap().unwrap();
        assert_eq!(still_active.status(), Some(ReservationStatus::Active));
    }

    // Expired hold no longer counts against availability.
    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.available, dec!(7));

    let movements = ledger::movements_for_order(&*db, tenant, order).await.unwrap();
    assert_eq!(
        movements
            .iter()
            .filter(|m| m.kind() == Some(MovementKind::ReservationExpire))
            .count(),
        1
    );

    // Nothing left to expire on the next sweep.
    let sweep = core.reservations.expire_due(Some(tenant)).await.unwrap();
    assert_eq!(sweep.expired_count, 0);
}

#[tokio::test]
async fn expiry_sweep_without_tenant_covers_all_tenants() {
    let (core, _db) = common::setup_core().await;
    let (product, location) = (Uuid::new_v4(), Uuid::new_v4());
    let tenant_a = Uuid::new_v4();
    let tenant_b = Uuid::new_v4();

    for tenant in [tenant_a, tenant_b] {
        core.inventory
            .receive(product, location, tenant, dec!(5), None, None)
            .await
            .unwrap();
        core.reservations
            .reserve(ReserveRequest {
                ttl_seconds: Some(0),
                ..request(tenant, Uuid::new_v4(), product, location, dec!(1))
            })
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(20)).await;

    // Scoped sweep only touches its own tenant.
    let sweep = core.reservations.expire_due(Some(tenant_a)).await.unwrap();
    assert_eq!(sweep.expired_count, 1);

    // Unscoped sweep picks up the rest.
    let sweep = core.reservations.expire_due(None).await.unwrap();
    assert_eq!(sweep.expired_count, 1);
    let snapshot = core.inventory.snapshot(tenant_b, product, location).await.unwrap();
    assert_eq!(snapshot.available, dec!(5));
}

#[tokio::test]
async fn commit_fails_when_on_hand_dropped_below_the_hold() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    let reservation = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(10)))
        .await
        .unwrap();

    // Physical stock shrinks underneath the hold.
    core.inventory
        .adjust(product, location, tenant, dec!(-5), Some("shrinkage".into()))
        .await
        .unwrap();

    let err = core
        .reservations
        .commit(reservation.id, tenant)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::WouldGoNegative(_)));

    // Nothing was applied: stock untouched, hold still Active.
    let snapshot = core.inventory.snapshot(tenant, product, location).await.unwrap();
    assert_eq!(snapshot.on_hand, dec!(5));
    let held = core
        .reservations
        .get(reservation.id, tenant)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(held.status(), Some(ReservationStatus::Active));
}

#[tokio::test]
async fn list_for_order_returns_reservations_oldest_first() {
    let (core, _db) = common::setup_core().await;
    let (tenant, order, product, location) =
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    core.inventory
        .receive(product, location, tenant, dec!(10), None, None)
        .await
        .unwrap();
    let first = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(1)))
        .await
        .unwrap();
    let second = core
        .reservations
        .reserve(request(tenant, order, product, location, dec!(2)))
        .await
        .unwrap();

    let listed = core.reservations.list_for_order(tenant, order).await.unwrap();
    assert_eq!(
        listed.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
}
