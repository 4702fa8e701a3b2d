//! Reservation lifecycle: reserve, commit, release, plus the TTL sweep an
//! external scheduler drives.
//!
//! Status machine: Active -> Committed | Released | Expired, all terminal.
//! Commit and release reject anything not Active. Every transition runs in
//! one transaction together with its ledger entries.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    inventory_reservation::{self, Entity as InventoryReservationEntity, ReservationStatus},
    stock_movement::MovementKind,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::queries;
use crate::services::inventory::{
    get_or_create_item, touch_item_version, update_on_hand_checked, MAX_CONFLICT_RETRIES,
};
use crate::services::ledger::{record_movement, NewMovement};
use crate::units::round_quantity;

/// Inputs for placing a soft hold against an order line.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub order_line_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    /// When set, the reservation becomes eligible for the expiry sweep after
    /// now + ttl.
    pub ttl_seconds: Option<i64>,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub expired_count: u64,
    pub swept_at: DateTime<Utc>,
}

/// Service managing the reservation state machine.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
}

impl ReservationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Places a soft hold: checks availability, inserts an Active reservation
    /// and a zero-delta `ReservationCreate` movement. On-hand is untouched.
    #[instrument(skip(self, request), fields(
        order_id = %request.order_id,
        product_id = %request.product_id,
        location_id = %request.location_id,
    ))]
    pub async fn reserve(
        &self,
        request: ReserveRequest,
    ) -> Result<inventory_reservation::Model, ServiceError> {
        let quantity = round_quantity(request.quantity);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidArgument(format!(
                "reservation quantity must be positive, got {quantity}"
            )));
        }

        let mut attempt = 0;
        let reservation = loop {
            match self.reserve_once(&request, quantity).await {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting reservation, retrying");
                }
                other => break other?,
            }
        };

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::InventoryReserved {
                    tenant_id: request.tenant_id,
                    product_id: request.product_id,
                    location_id: request.location_id,
                    order_id: request.order_id,
                    reservation_id: reservation.id,
                    quantity,
                })
                .await;
        }

        info!(
            reservation_id = %reservation.id,
            quantity = %quantity,
            "reservation created"
        );
        Ok(reservation)
    }

    async fn reserve_once(
        &self,
        request: &ReserveRequest,
        quantity: Decimal,
    ) -> Result<inventory_reservation::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let item = get_or_create_item(
            &txn,
            request.tenant_id,
            request.product_id,
            request.location_id,
        )
        .await?;
        let reserved = queries::active_reservation_total(
            &txn,
            request.tenant_id,
            request.product_id,
            request.location_id,
        )
        .await?;
        let available = item.on_hand - reserved;
        if available < quantity {
            return Err(ServiceError::InsufficientInventory {
                available,
                requested: quantity,
            });
        }

        // Serializes against concurrent reservations and mutations on the
        // same item; on-hand itself does not change here.
        touch_item_version(&txn, &item).await?;

        let now = Utc::now();
        let reservation = inventory_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(request.tenant_id),
            product_id: Set(request.product_id),
            location_id: Set(request.location_id),
            order_id: Set(request.order_id),
            order_line_id: Set(request.order_line_id),
            quantity: Set(quantity),
            status: Set(ReservationStatus::Active.as_str().to_string()),
            expires_at: Set(request.ttl_seconds.map(|ttl| now + Duration::seconds(ttl))),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        record_movement(
            &txn,
            NewMovement {
                tenant_id: request.tenant_id,
                product_id: request.product_id,
                location_id: request.location_id,
                kind: MovementKind::ReservationCreate,
                quantity: Decimal::ZERO,
                order_id: Some(request.order_id),
                order_line_id: Some(request.order_line_id),
                reference: None,
                notes: None,
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(reservation)
    }

    /// Converts an Active reservation into a permanent on-hand deduction.
    /// Fails with `WouldGoNegative` and applies nothing when the deduction
    /// would drop on-hand below zero.
    #[instrument(skip(self))]
    pub async fn commit(&self, reservation_id: Uuid, tenant_id: Uuid) -> Result<(), ServiceError> {
        let mut attempt = 0;
        let reservation = loop {
            match self.commit_once(reservation_id, tenant_id).await {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting commit, retrying");
                }
                other => break other?,
            }
        };

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::ReservationCommitted {
                    tenant_id,
                    reservation_id,
                    quantity: reservation.quantity,
                })
                .await;
        }

        info!(reservation_id = %reservation_id, "reservation committed");
        Ok(())
    }

    async fn commit_once(
        &self,
        reservation_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<inventory_reservation::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let reservation = find_reservation(&txn, reservation_id, tenant_id).await?;
        ensure_active(&reservation)?;

        let item = get_or_create_item(
            &txn,
            tenant_id,
            reservation.product_id,
            reservation.location_id,
        )
        .await?;
        let new_on_hand = round_quantity(item.on_hand - reservation.quantity);
        if new_on_hand < Decimal::ZERO {
            return Err(ServiceError::WouldGoNegative(format!(
                "committing reservation {reservation_id} would drop on-hand to {new_on_hand}"
            )));
        }
        update_on_hand_checked(&txn, &item, new_on_hand).await?;
        transition_status_checked(&txn, &reservation, ReservationStatus::Committed).await?;

        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id: reservation.product_id,
                location_id: reservation.location_id,
                kind: MovementKind::ReservationCommit,
                quantity: Decimal::ZERO,
                order_id: Some(reservation.order_id),
                order_line_id: Some(reservation.order_line_id),
                reference: None,
                notes: None,
            },
        )
        .await?;
        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id: reservation.product_id,
                location_id: reservation.location_id,
                kind: MovementKind::Sale,
                quantity: -reservation.quantity,
                order_id: Some(reservation.order_id),
                order_line_id: Some(reservation.order_line_id),
                reference: None,
                notes: None,
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(reservation)
    }

    /// Cancels an Active reservation without touching on-hand.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        reservation_id: Uuid,
        tenant_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut attempt = 0;
        loop {
            match self
                .release_once(reservation_id, tenant_id, reason.clone())
                .await
            {
                Err(ServiceError::ConcurrentModification(id))
                    if attempt + 1 < MAX_CONFLICT_RETRIES =>
                {
                    attempt += 1;
                    warn!(item_id = %id, attempt, "conflicting release, retrying");
                }
                other => break other?,
            }
        }

        if let Some(sender) = &self.event_sender {
            let _ = sender
                .send(Event::ReservationReleased {
                    tenant_id,
                    reservation_id,
                    reason,
                })
                .await;
        }

        info!(reservation_id = %reservation_id, "reservation released");
        Ok(())
    }

    async fn release_once(
        &self,
        reservation_id: Uuid,
        tenant_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let reservation = find_reservation(&txn, reservation_id, tenant_id).await?;
        ensure_active(&reservation)?;

        transition_status_checked(&txn, &reservation, ReservationStatus::Released).await?;

        record_movement(
            &txn,
            NewMovement {
                tenant_id,
                product_id: reservation.product_id,
                location_id: reservation.location_id,
                kind: MovementKind::ReservationRelease,
                quantity: Decimal::ZERO,
                order_id: Some(reservation.order_id),
                order_line_id: Some(reservation.order_line_id),
                reference: None,
                notes: Some(reason.unwrap_or_else(|| "reservation released".to_string())),
            },
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    pub async fn get(
        &self,
        reservation_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<inventory_reservation::Model>, ServiceError> {
        InventoryReservationEntity::find_by_id(reservation_id)
            .filter(inventory_reservation::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// All reservations tied to one order, oldest first.
    pub async fn list_for_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<inventory_reservation::Model>, ServiceError> {
        InventoryReservationEntity::find()
            .filter(inventory_reservation::Column::TenantId.eq(tenant_id))
            .filter(inventory_reservation::Column::OrderId.eq(order_id))
            .order_by_asc(inventory_reservation::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Transitions every Active reservation whose TTL has passed to Expired,
    /// with a zero-delta `ReservationExpire` marker each. Scoped to one tenant
    /// when given, otherwise sweeps all of them. Meant to be called
    /// periodically by an external scheduler.
    #[instrument(skip(self))]
    pub async fn expire_due(&self, tenant_id: Option<Uuid>) -> Result<ExpirySweep, ServiceError> {
        let now = Utc::now();

        let mut query = InventoryReservationEntity::find()
            .filter(inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
            .filter(inventory_reservation::Column::ExpiresAt.lt(now));
        if let Some(tenant_id) = tenant_id {
            query = query.filter(inventory_reservation::Column::TenantId.eq(tenant_id));
        }
        let due = query.all(&*self.db).await.map_err(ServiceError::db_error)?;

        let mut expired = Vec::with_capacity(due.len());
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        for reservation in due {
            match transition_status_checked(&txn, &reservation, ReservationStatus::Expired).await {
                Ok(()) => {
                    record_movement(
                        &txn,
                        NewMovement {
                            tenant_id: reservation.tenant_id,
                            product_id: reservation.product_id,
                            location_id: reservation.location_id,
                            kind: MovementKind::ReservationExpire,
                            quantity: Decimal::ZERO,
                            order_id: Some(reservation.order_id),
                            order_line_id: Some(reservation.order_line_id),
                            reference: None,
                            notes: None,
                        },
                    )
                    .await?;
                    expired.push((reservation.id, reservation.tenant_id));
                }
                Err(ServiceError::ConcurrentModification(id)) => {
                    // Transitioned by someone else between the read and here.
                    warn!(reservation_id = %id, "skipping reservation during expiry sweep");
                }
                Err(other) => return Err(other),
            }
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        if let Some(sender) = &self.event_sender {
            for (reservation_id, tenant_id) in &expired {
                let _ = sender
                    .send(Event::ReservationExpired {
                        tenant_id: *tenant_id,
                        reservation_id: *reservation_id,
                        expired_at: now,
                    })
                    .await;
            }
        }

        info!(expired_count = expired.len(), "expiry sweep completed");
        Ok(ExpirySweep {
            expired_count: expired.len() as u64,
            swept_at: now,
        })
    }
}

async fn find_reservation<C: ConnectionTrait>(
    conn: &C,
    reservation_id: Uuid,
    tenant_id: Uuid,
) -> Result<inventory_reservation::Model, ServiceError> {
    InventoryReservationEntity::find_by_id(reservation_id)
        .filter(inventory_reservation::Column::TenantId.eq(tenant_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("reservation {reservation_id} not found")))
}

fn ensure_active(reservation: &inventory_reservation::Model) -> Result<(), ServiceError> {
    match reservation.status() {
        Some(ReservationStatus::Active) => Ok(()),
        _ => Err(ServiceError::InvalidState {
            id: reservation.id,
            status: reservation.status.clone(),
        }),
    }
}

/// Status write guarded on the row still being Active, so a transition can
/// only ever happen once per reservation.
async fn transition_status_checked<C: ConnectionTrait>(
    conn: &C,
    reservation: &inventory_reservation::Model,
    to: ReservationStatus,
) -> Result<(), ServiceError> {
    let result = InventoryReservationEntity::update_many()
        .col_expr(
            inventory_reservation::Column::Status,
            Expr::value(to.as_str()),
        )
        .col_expr(
            inventory_reservation::Column::UpdatedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(inventory_reservation::Column::Id.eq(reservation.id))
        .filter(inventory_reservation::Column::Status.eq(ReservationStatus::Active.as_str()))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(reservation.id));
    }
    Ok(())
}
