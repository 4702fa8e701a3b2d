//! Read-side queries: the inventory snapshot.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::{
    inventory_item::{self, Entity as InventoryItemEntity},
    inventory_reservation::{self, Entity as InventoryReservationEntity, ReservationStatus},
};
use crate::errors::ServiceError;

/// Point-in-time stock picture for one (tenant, product, location) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySnapshot {
    /// Physical quantity currently recorded in stock. Zero when no item row
    /// exists yet.
    pub on_hand: Decimal,
    /// On-hand minus all active reservations: the quantity sellable now.
    pub available: Decimal,
    pub safety_stock: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
}

impl InventorySnapshot {
    pub fn below_reorder_point(&self) -> bool {
        self.reorder_point
            .map(|point| self.available < point)
            .unwrap_or(false)
    }
}

/// Computes the snapshot on any connection, so mutating operations can reuse
/// it inside their own transaction.
pub async fn load_snapshot<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<InventorySnapshot, ServiceError> {
    let item = InventoryItemEntity::find()
        .filter(inventory_item::Column::TenantId.eq(tenant_id))
        .filter(inventory_item::Column::ProductId.eq(product_id))
        .filter(inventory_item::Column::LocationId.eq(location_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let on_hand = item
        .as_ref()
        .map(|i| i.on_hand)
        .unwrap_or(Decimal::ZERO);
    let reserved = active_reservation_total(conn, tenant_id, product_id, location_id).await?;

    Ok(InventorySnapshot {
        on_hand,
        available: on_hand - reserved,
        safety_stock: item.as_ref().and_then(|i| i.safety_stock),
        reorder_point: item.as_ref().and_then(|i| i.reorder_point),
    })
}

/// Sum of all active reservation quantities against one item.
pub(crate) async fn active_reservation_total<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let reservations = InventoryReservationEntity::find()
        .filter(inventory_reservation::Column::TenantId.eq(tenant_id))
        .filter(inventory_reservation::Column::ProductId.eq(product_id))
        .filter(inventory_reservation::Column::LocationId.eq(location_id))
        .filter(inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(reservations.iter().map(|r| r.quantity).sum())
}
