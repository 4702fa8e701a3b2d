//! Order-level orchestration: expand a finished product through its recipe
//! and drive the reservation lifecycle for every component at once.

use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::inventory_reservation::{self, ReservationStatus};
use crate::errors::ServiceError;
use crate::services::bom::BomService;
use crate::services::reservations::{ReservationService, ReserveRequest};
use crate::units::UnitOfMeasure;

/// Inputs for reserving all components behind one order line.
#[derive(Debug, Clone)]
pub struct OrderLineReservationRequest {
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub order_line_id: Uuid,
    pub product_id: Uuid,
    pub location_id: Uuid,
    pub quantity: Decimal,
    /// Unit reported for the product itself when it has no recipe.
    pub fallback_unit: UnitOfMeasure,
    pub ttl_seconds: Option<i64>,
}

/// Composes BOM expansion with the reservation lifecycle.
#[derive(Clone)]
pub struct OrderReservationService {
    bom: BomService,
    reservations: ReservationService,
}

impl OrderReservationService {
    pub fn new(bom: BomService, reservations: ReservationService) -> Self {
        Self { bom, reservations }
    }

    /// Reserves every component required to fulfill one order line.
    ///
    /// Each component reservation is its own atomic operation; when one fails
    /// mid-batch, reservations created earlier in the batch stay Active and
    /// the error propagates. Callers recover with [`Self::release_for_order`].
    #[instrument(skip(self, request), fields(
        order_id = %request.order_id,
        product_id = %request.product_id,
    ))]
    pub async fn reserve_for_order_line(
        &self,
        request: OrderLineReservationRequest,
    ) -> Result<Vec<inventory_reservation::Model>, ServiceError> {
        let requirements = self
            .bom
            .expand_requirements(
                request.product_id,
                request.quantity,
                request.fallback_unit,
                request.tenant_id,
            )
            .await?;

        let mut reserved = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let reservation = self
                .reservations
                .reserve(ReserveRequest {
                    tenant_id: request.tenant_id,
                    order_id: request.order_id,
                    order_line_id: request.order_line_id,
                    product_id: requirement.product_id,
                    location_id: request.location_id,
                    quantity: requirement.quantity,
                    ttl_seconds: request.ttl_seconds,
                })
                .await?;
            reserved.push(reservation);
        }

        info!(
            order_id = %request.order_id,
            reservation_count = reserved.len(),
            "order line reserved"
        );
        Ok(reserved)
    }

    /// Commits every Active reservation tied to the order, sequentially.
    /// Returns how many were committed.
    #[instrument(skip(self))]
    pub async fn commit_for_order(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let mut committed = 0u64;
        for reservation in self.active_for_order(tenant_id, order_id).await? {
            self.reservations.commit(reservation.id, tenant_id).await?;
            committed += 1;
        }

        info!(order_id = %order_id, committed, "order reservations committed");
        Ok(committed)
    }

    /// Releases every Active reservation tied to the order, sequentially.
    /// Returns how many were released.
    #[instrument(skip(self))]
    pub async fn release_for_order(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        reason: Option<String>,
    ) -> Result<u64, ServiceError> {
        let mut released = 0u64;
        for reservation in self.active_for_order(tenant_id, order_id).await? {
            self.reservations
                .release(reservation.id, tenant_id, reason.clone())
                .await?;
            released += 1;
        }

        info!(order_id = %order_id, released, "order reservations released");
        Ok(released)
    }

    async fn active_for_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<inventory_reservation::Model>, ServiceError> {
        let reservations = self.reservations.list_for_order(tenant_id, order_id).await?;
        Ok(reservations
            .into_iter()
            .filter(|r| r.status() == Some(ReservationStatus::Active))
            .collect())
    }
}
