use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock on hand for one (tenant, product, location) triple.
///
/// Rows are created lazily on the first mutation or reservation and never
/// deleted while movements reference them. The `version` column is the
/// optimistic-concurrency token: every read-check-write sequence bumps it,
/// which is what serializes concurrent operations on the same item.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub on_hand: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub safety_stock: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub reorder_point: Option<Decimal>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
