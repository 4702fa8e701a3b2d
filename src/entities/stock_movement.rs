use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of ledger movements.
///
/// Reservation lifecycle markers carry a zero quantity delta since they do
/// not change on-hand; everything else carries the signed delta applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Receipt,
    Sale,
    Adjustment,
    TransferIn,
    TransferOut,
    ReservationCreate,
    ReservationCommit,
    ReservationRelease,
    ReservationExpire,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receipt => "RECEIPT",
            MovementKind::Sale => "SALE",
            MovementKind::Adjustment => "ADJUSTMENT",
            MovementKind::TransferIn => "TRANSFER_IN",
            MovementKind::TransferOut => "TRANSFER_OUT",
            MovementKind::ReservationCreate => "RESERVATION_CREATE",
            MovementKind::ReservationCommit => "RESERVATION_COMMIT",
            MovementKind::ReservationRelease => "RESERVATION_RELEASE",
            MovementKind::ReservationExpire => "RESERVATION_EXPIRE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RECEIPT" => Some(MovementKind::Receipt),
            "SALE" => Some(MovementKind::Sale),
            "ADJUSTMENT" => Some(MovementKind::Adjustment),
            "TRANSFER_IN" => Some(MovementKind::TransferIn),
            "TRANSFER_OUT" => Some(MovementKind::TransferOut),
            "RESERVATION_CREATE" => Some(MovementKind::ReservationCreate),
            "RESERVATION_COMMIT" => Some(MovementKind::ReservationCommit),
            "RESERVATION_RELEASE" => Some(MovementKind::ReservationRelease),
            "RESERVATION_EXPIRE" => Some(MovementKind::ReservationExpire),
            _ => None,
        }
    }
}

/// Append-only ledger entry. Movements are never updated or deleted after
/// creation; they are the audit trail for every state-changing operation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub movement_type: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    pub order_id: Option<Uuid>,
    pub order_line_id: Option<Uuid>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        MovementKind::from_str(&self.movement_type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
