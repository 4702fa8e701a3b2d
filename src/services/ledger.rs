//! Movement recorder: the append-only audit trail.
//!
//! Every mutating operation writes one or more movement rows through
//! `record_movement` inside its own transaction. Rows are never updated or
//! deleted.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use crate::entities::stock_movement::{self, Entity as StockMovementEntity, MovementKind};
use crate::errors::ServiceError;

/// Draft of a ledger entry, filled by the mutating operations.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub kind: MovementKind,
    /// Signed delta applied to on-hand; zero for reservation lifecycle markers.
    pub quantity: Decimal,
    pub order_id: Option<Uuid>,
    pub order_line_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

pub(crate) async fn record_movement<C: ConnectionTrait>(
    conn: &C,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let row = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(movement.tenant_id),
        product_id: Set(movement.product_id),
        location_id: Set(movement.location_id),
        movement_type: Set(movement.kind.as_str().to_string()),
        quantity: Set(movement.quantity),
        order_id: Set(movement.order_id),
        order_line_id: Set(movement.order_line_id),
        reference: Set(movement.reference),
        notes: Set(movement.notes),
        created_at: Set(Utc::now()),
    };

    row.insert(conn).await.map_err(ServiceError::db_error)
}

/// Movement history for one item, newest first.
pub async fn movements_for_item<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    product_id: Uuid,
    location_id: Uuid,
) -> Result<Vec<stock_movement::Model>, ServiceError> {
    StockMovementEntity::find()
        .filter(stock_movement::Column::TenantId.eq(tenant_id))
        .filter(stock_movement::Column::ProductId.eq(product_id))
        .filter(stock_movement::Column::LocationId.eq(location_id))
        .order_by_desc(stock_movement::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// Movement history tied to one order, newest first.
pub async fn movements_for_order<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    order_id: Uuid,
) -> Result<Vec<stock_movement::Model>, ServiceError> {
    StockMovementEntity::find()
        .filter(stock_movement::Column::TenantId.eq(tenant_id))
        .filter(stock_movement::Column::OrderId.eq(order_id))
        .order_by_desc(stock_movement::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}
