//! Units of measure and the quantity rounding policy.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ServiceError;

/// Units of measure accepted on recipe components and requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    Gram,
    Kilogram,
    Milliliter,
    Liter,
    Piece,
}

impl UnitOfMeasure {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Gram => "g",
            UnitOfMeasure::Kilogram => "kg",
            UnitOfMeasure::Milliliter => "ml",
            UnitOfMeasure::Liter => "l",
            UnitOfMeasure::Piece => "pc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "g" => Some(UnitOfMeasure::Gram),
            "kg" => Some(UnitOfMeasure::Kilogram),
            "ml" => Some(UnitOfMeasure::Milliliter),
            "l" => Some(UnitOfMeasure::Liter),
            "pc" => Some(UnitOfMeasure::Piece),
            _ => None,
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts a quantity between compatible units of measure.
///
/// Identity for any unit to itself, gram/kilogram and milliliter/liter by a
/// factor of 1000. Pieces only convert to pieces. Any other pair fails with
/// [`ServiceError::UnsupportedConversion`].
pub fn convert(
    quantity: Decimal,
    from: UnitOfMeasure,
    to: UnitOfMeasure,
) -> Result<Decimal, ServiceError> {
    use UnitOfMeasure::*;

    if from == to {
        return Ok(quantity);
    }

    let converted = match (from, to) {
        (Gram, Kilogram) => quantity / dec!(1000),
        (Kilogram, Gram) => quantity * dec!(1000),
        (Milliliter, Liter) => quantity / dec!(1000),
        (Liter, Milliliter) => quantity * dec!(1000),
        _ => {
            return Err(ServiceError::UnsupportedConversion {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    };

    Ok(converted)
}

/// Rounds a quantity to 2 decimal places, half away from zero.
///
/// Applied to every on-hand mutation before it is persisted or compared.
pub fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
