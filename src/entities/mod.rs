pub mod inventory_item;
pub mod inventory_reservation;
pub mod recipe_component;
pub mod stock_movement;
