#![allow(dead_code)]

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use stockledger::db;
use stockledger::events::{process_events, EventSender};
use stockledger::InventoryCore;
use tokio::sync::mpsc;

/// In-memory SQLite with migrations applied. A single connection keeps every
/// test against the same database.
pub async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let pool = Database::connect(options).await.expect("sqlite connect");
    db::run_migrations(&pool).await.expect("migrations");
    pool
}

/// Full service stack over a fresh database, with a logging event consumer.
pub async fn setup_core() -> (InventoryCore, Arc<DatabaseConnection>) {
    let pool = Arc::new(connect().await);
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(process_events(rx));
    let core = InventoryCore::new(pool.clone(), Some(EventSender::new(tx)));
    (core, pool)
}
