//! Line pricing: catalog price, multipliers, assembly and modifications
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use super::multiplier::Multipliers;
use super::proposal::{AssemblyFee, LineItem};

/// Priced view of one line. Values keep full precision; round with
/// [`round_money`] only when displaying or totalling.
///
/// Arithmetic saturates at `Decimal::MAX` instead of overflowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePrice {
    /// Catalog price times the cost multiplier only.
    pub cost_unit_price: Decimal,
    /// Catalog price times cost and customer multipliers.
    pub unit_price: Decimal,
    pub quantity: u32,
    /// `unit_price * quantity`
    pub extended_price: Decimal,
    pub assembly_cost: Decimal,
    pub modifications_total: Decimal,
    pub line_total: Decimal,
}

/// Half-up rounding to cents.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Assembly fee owed for one unit at the given customer unit price.
pub fn assembly_per_unit(fee: &AssemblyFee, unit_price: Decimal) -> Decimal {
    match fee {
        AssemblyFee::Flat { per_unit } => (*per_unit).max(Decimal::ZERO),
        AssemblyFee::Percentage { percent } => {
            unit_price.saturating_mul((*percent).max(Decimal::ZERO)) / Decimal::ONE_HUNDRED
        }
    }
}

pub fn price_line(item: &LineItem, multipliers: &Multipliers) -> LinePrice {
    let catalog = item.catalog_price.max(Decimal::ZERO);
    let quantity = Decimal::from(item.quantity);

    let cost_unit_price = catalog.saturating_mul(multipliers.cost);
    let unit_price = cost_unit_price.saturating_mul(multipliers.customer);
    let extended_price = unit_price.saturating_mul(quantity);

    let assembly_cost = match (&item.assembly_fee, item.include_assembly_fee) {
        (Some(fee), true) => assembly_per_unit(fee, unit_price).saturating_mul(quantity),
        _ => Decimal::ZERO,
    };

    let modifications_total = item
        .modifications
        .iter()
        .fold(Decimal::ZERO, |total, m| total.saturating_add(m.total()));

    if extended_price == Decimal::MAX || modifications_total == Decimal::MAX {
        warn!(code = %item.code, "line amount saturated");
    }

    LinePrice {
        cost_unit_price,
        unit_price,
        quantity: item.quantity,
        extended_price,
        assembly_cost,
        modifications_total,
        line_total: extended_price
            .saturating_add(assembly_cost)
            .saturating_add(modifications_total),
    }
}

impl LinePrice {
    /// The same line with every amount rounded to cents.
    pub fn rounded(&self) -> LinePrice {
        LinePrice {
            cost_unit_price: round_money(self.cost_unit_price),
            unit_price: round_money(self.unit_price),
            quantity: self.quantity,
            extended_price: round_money(self.extended_price),
            assembly_cost: round_money(self.assembly_cost),
            modifications_total: round_money(self.modifications_total),
            line_total: round_money(self.line_total),
        }
    }
}
