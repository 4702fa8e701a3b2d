//! Stock mutation operations: receive, adjust, transfer.
//!
//! Each public operation runs as one transaction: item update plus the paired
//! movement rows all apply, or none do. The inventory item row is the
//! serialization point; its version column is checked on every write and the
//! whole transaction retries on conflict.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    inventory_item::{self, Entity as InventoryItemEntity},
    stock_movement::MovementKind,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::queries::{self, InventorySnapshot};
use crate::services::ledger::{record_movement, NewMovement};
use crate::units::round_quantity;

/// How many times a conflicting transaction is retried before the
/// `ConcurrentModification` error surfaces to the caller.
pub(crate) const MAX_CONFLICT_RETRIES: u32 = 3;

/// Service for direct on-hand mutations.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds received stock to on-hand and appends a `Receipt` movement.
    #[instrument(skip(self))]
    pub async fn receive(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        tenant_id: Uuid,
        quantity: Decimal,
        reference: Option<String>,
        notes: Option<String>,
    ) -> Result<inventory_item::Model, ServiceError> {
        let quantity = round_quantity(quantity);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidArgument(format!(
                "receive quantity must be positive, got {quantity}"
            )));
        }

        let mut attempt = 0;
        let item = loop {
            let result = self
                .receive_once(
                    product_id,
                    location_id,
                    tenant_id,
                    quantity,
                    reference.clone(),
                    notes.clone(),
                )
                .await;
            match result {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting receive, retrying");
                }
                other => break other?,
            }
        };

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::InventoryReceived {
                    tenant_id,
                    product_id,
                    location_id,
                    quantity,
                })
                .await;
        }

        info!(
            product_id = %product_id,
            location_id = %location_id,
            quantity = %quantity,
            new_on_hand = %item.on_hand,
            "stock received"
        );
        Ok(item)
    }

    async fn receive_once(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        tenant_id: Uuid,
        quantity: Decimal,
        reference: Option<String>,
        notes: Option<String>,
    ) -> Result<inventory_item::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = get_or_create_item(&txn, tenant_id, product_id, location_id).await?;
        let new_on_hand = round_quantity(item.on_hand + quantity);
        update_on_hand_checked(&txn, &item, new_on_hand).await?;

        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id,
                location_id,
                kind: MovementKind::Receipt,
                quantity,
                order_id: None,
                order_line_id: None,
                reference,
                notes,
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(inventory_item::Model {
            on_hand: new_on_hand,
            version: item.version + 1,
            ..item
        })
    }

    /// Applies a signed correction to on-hand and appends an `Adjustment`
    /// movement. Fails with `WouldGoNegative` when the result would drop
    /// below zero, in which case nothing is applied.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        tenant_id: Uuid,
        delta: Decimal,
        reason: Option<String>,
    ) -> Result<inventory_item::Model, ServiceError> {
        let delta = round_quantity(delta);

        let mut attempt = 0;
        let item = loop {
            let result = self
                .adjust_once(product_id, location_id, tenant_id, delta, reason.clone())
                .await;
            match result {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting adjustment, retrying");
                }
                other => break other?,
            }
        };

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::InventoryAdjusted {
                    tenant_id,
                    product_id,
                    location_id,
                    delta,
                    new_on_hand: item.on_hand,
                })
                .await;
        }

        info!(
            product_id = %product_id,
            location_id = %location_id,
            delta = %delta,
            new_on_hand = %item.on_hand,
            "stock adjusted"
        );
        Ok(item)
    }

    async fn adjust_once(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        tenant_id: Uuid,
        delta: Decimal,
        reason: Option<String>,
    ) -> Result<inventory_item::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = get_or_create_item(&txn, tenant_id, product_id, location_id).await?;
        let new_on_hand = round_quantity(item.on_hand + delta);
        if new_on_hand < Decimal::ZERO {
            return Err(ServiceError::WouldGoNegative(format!(
                "adjustment of {delta} would drop on-hand to {new_on_hand} for product {product_id} at location {location_id}"
            )));
        }
        update_on_hand_checked(&txn, &item, new_on_hand).await?;

        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id,
                location_id,
                kind: MovementKind::Adjustment,
                quantity: delta,
                order_id: None,
                order_line_id: None,
                reference: None,
                notes: reason,
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(inventory_item::Model {
            on_hand: new_on_hand,
            version: item.version + 1,
            ..item
        })
    }

    /// Moves stock between two locations, appending paired `TransferOut` and
    /// `TransferIn` movements. Atomic across both item rows.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        product_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        tenant_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        let quantity = round_quantity(quantity);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidArgument(format!(
                "transfer quantity must be positive, got {quantity}"
            )));
        }
        if from_location_id == to_location_id {
            return Err(ServiceError::InvalidArgument(
                "transfer source and destination locations must differ".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            let result = self
                .transfer_once(
                    product_id,
                    from_location_id,
                    to_location_id,
                    tenant_id,
                    quantity,
                    notes.clone(),
                )
                .await;
            match result {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting transfer, retrying");
                }
                other => break other?,
            }
        }

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::InventoryTransferred {
                    tenant_id,
                    product_id,
                    from_location_id,
                    to_location_id,
                    quantity,
                })
                .await;
        }

        info!(
            product_id = %product_id,
            from = %from_location_id,
            to = %to_location_id,
            quantity = %quantity,
            "stock transferred"
        );
        Ok(())
    }

    async fn transfer_once(
        &self,
        product_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        tenant_id: Uuid,
        quantity: Decimal,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let source = get_or_create_item(&txn, tenant_id, product_id, from_location_id).await?;
        if source.on_hand < quantity {
            return Err(ServiceError::InsufficientInventory {
                available: source.on_hand,
                requested: quantity,
            });
        }
        let destination = get_or_create_item(&txn, tenant_id, product_id, to_location_id).await?;

        // Touch the two rows in id order so opposite-direction transfers
        // cannot deadlock on row locks.
        let mut updates = [
            (&source, round_quantity(source.on_hand - quantity)),
            (&destination, round_quantity(destination.on_hand + quantity)),
        ];
        updates.sort_by_key(|(item, _)| item.id);
        for (item, new_on_hand) in updates {
            update_on_hand_checked(&txn, item, new_on_hand).await?;
        }

        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id,
                location_id: from_location_id,
                kind: MovementKind::TransferOut,
                quantity: -quantity,
                order_id: None,
                order_line_id: None,
                reference: None,
                notes: notes.clone(),
            },
        )
        .await?;
        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id,
                location_id: to_location_id,
                kind: MovementKind::TransferIn,
                quantity,
                order_id: None,
                order_line_id: None,
                reference: None,
                notes,
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    /// Sets the safety-stock and reorder-point thresholds on an item,
    /// creating the row when absent.
    #[instrument(skip(self))]
    pub async fn set_stock_thresholds(
        &self,
        product_id: Uuid,
        location_id: Uuid,
        tenant_id: Uuid,
        safety_stock: Option<Decimal>,
        reorder_point: Option<Decimal>,
    ) -> Result<inventory_item::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = get_or_create_item(&txn, tenant_id, product_id, location_id).await?;
        let mut active: inventory_item::ActiveModel = item.into();
        active.safety_stock = Set(safety_stock.map(round_quantity));
        active.reorder_point = Set(reorder_point.map(round_quantity));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(updated)
    }

    /// Current on-hand and available picture for one item.
    #[instrument(skip(self))]
    pub async fn snapshot(
        &self,
        tenant_id: Uuid,
        product_id: Uuid,
        location_id: Uuid,
    ) -> Result<InventorySnapshot, ServiceError> {
        queries::load_snapshot(&*self.db, tenant_id, product_id, location_id).await
    }
}

async fn find_item<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<Option<inventory_item::Model>, ServiceError> {
    InventoryItemEntity::find()
        .filter(inventory_item::Column::TenantId.eq(tenant_id))
        .filter(inventory_item::Column::ProductId.eq(product_id))
        .filter(inventory_item::Column::LocationId.eq(location_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Get-or-create semantics for the item row: created with zero on-hand on the
/// first mutation or reservation against a (product, location) pair.
pub(crate) async fn get_or_create_item<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<inventory_item::Model, ServiceError> {
    if let Some(item) = find_item(conn, tenant_id, product_id, location_id).await? {
        return Ok(item);
    }

    let now = Utc::now();
    let fresh = inventory_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        product_id: Set(product_id),
        location_id: Set(location_id),
        on_hand: Set(Decimal::ZERO),
        safety_stock: Set(None),
        reorder_point: Set(None),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match fresh.insert(conn).await {
        Ok(item) => Ok(item),
        // Lost a create race on the (tenant, product, location) unique index.
        Err(insert_err) => match find_item(conn, tenant_id, product_id, location_id).await? {
            Some(item) => Ok(item),
            None => Err(ServiceError::Database(insert_err)),
        },
    }
}

/// Version-checked write of the on-hand quantity. Zero rows affected means
/// another transaction won the race; the caller retries from a fresh read.
pub(crate) async fn update_on_hand_checked<C: ConnectionTrait>(
    conn: &C,
    item: &inventory_item::Model,
    new_on_hand: Decimal,
) -> Result<(), ServiceError> {
    let result = InventoryItemEntity::update_many()
        .col_expr(inventory_item::Column::OnHand, Expr::value(new_on_hand))
        .col_expr(inventory_item::Column::Version, Expr::value(item.version + 1))
        .col_expr(inventory_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(inventory_item::Column::Id.eq(item.id))
        .filter(inventory_item::Column::Version.eq(item.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(item.id));
    }
    Ok(())
}

/// Bumps the item version without changing on-hand. Reserve uses this so two
/// reservations cannot both pass the availability check against the same
/// stale snapshot.
pub(crate) async fn touch_item_version<C: ConnectionTrait>(
    conn: &C,
    item: &inventory_item::Model,
) -> Result<(), ServiceError> {
    update_on_hand_checked(conn, item, item.on_hand).await
}
