//! Inventory ledger & reservation engine.
//!
//! Tracks stock on hand per (tenant, product, location), supports soft holds
//! against in-flight orders with a commit/release lifecycle, records every
//! state change in an append-only movement ledger, and expands finished
//! products into component requirements through a single-level
//! bill-of-materials.
//!
//! Every mutating operation is one local ACID transaction; dropping an
//! operation future before it commits rolls the transaction back.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod queries;
pub mod services;
pub mod units;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;
use crate::services::bom::BomService;
use crate::services::inventory::InventoryService;
use crate::services::order_reservations::OrderReservationService;
use crate::services::reservations::ReservationService;

/// Bundles the core services over one connection pool.
#[derive(Clone)]
pub struct InventoryCore {
    pub inventory: InventoryService,
    pub reservations: ReservationService,
    pub bom: BomService,
    pub orders: OrderReservationService,
}

impl InventoryCore {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        let inventory = InventoryService::new(db.clone(), event_sender.clone());
        let reservations = ReservationService::new(db.clone(), event_sender);
        let bom = BomService::new(db);
        let orders = OrderReservationService::new(bom.clone(), reservations.clone());

        Self {
            inventory,
            reservations,
            bom,
            orders,
        }
    }
}
