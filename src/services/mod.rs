// Stock mutations and item bookkeeping
pub mod inventory;

// Append-only movement ledger
pub mod ledger;

// Reservation lifecycle
pub mod reservations;

// Bill-of-materials expansion
pub mod bom;

// Order-level orchestration
pub mod order_reservations;
