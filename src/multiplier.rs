//! Vendor cost multipliers and contractor group multipliers
use rust_decimal::Decimal;
use tracing::debug;

use super::error::ProposalError;

/// The pair of multipliers that prices one vendor's lines for one
/// contractor group.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multipliers {
    /// What the seller pays the vendor, relative to catalog price.
    #[n(0)]
    #[cbor(with = "crate::types::decimal")]
    pub cost: Decimal,
    /// Markup on top of cost for the end customer.
    #[n(1)]
    #[cbor(with = "crate::types::decimal")]
    pub customer: Decimal,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VendorMultiplier {
    #[n(0)]
    pub vendor_id: String,
    #[n(1)]
    #[cbor(with = "crate::types::decimal")]
    pub cost_multiplier: Decimal,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct GroupMultiplier {
    #[n(0)]
    pub group_id: String,
    #[n(1)]
    #[cbor(with = "crate::types::decimal")]
    pub multiplier: Decimal,
    #[n(2)]
    pub enabled: bool,
}

/// Every multiplier currently in effect. Stored as a single record so a
/// lock reads one consistent version of it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiplierBook {
    #[n(0)]
    pub vendors: Vec<VendorMultiplier>,
    #[n(1)]
    pub groups: Vec<GroupMultiplier>,
}

impl Multipliers {
    pub fn new(cost: Decimal, customer: Decimal) -> Self {
        Self { cost, customer }
    }

    /// Catalog price times both multipliers.
    pub fn customer_factor(&self) -> Decimal {
        self.cost * self.customer
    }
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            cost: Decimal::ONE,
            customer: Decimal::ONE,
        }
    }
}

impl MultiplierBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vendor(mut self, vendor_id: &str, cost_multiplier: Decimal) -> Self {
        self.upsert_vendor(vendor_id, cost_multiplier);
        self
    }

    pub fn set_group(mut self, group_id: &str, multiplier: Decimal, enabled: bool) -> Self {
        self.upsert_group(group_id, multiplier, enabled);
        self
    }

    pub fn upsert_vendor(&mut self, vendor_id: &str, cost_multiplier: Decimal) {
        match self.vendors.iter_mut().find(|v| v.vendor_id == vendor_id) {
            Some(entry) => entry.cost_multiplier = cost_multiplier,
            None => self.vendors.push(VendorMultiplier {
                vendor_id: vendor_id.to_string(),
                cost_multiplier,
            }),
        }
    }

    pub fn upsert_group(&mut self, group_id: &str, multiplier: Decimal, enabled: bool) {
        match self.groups.iter_mut().find(|g| g.group_id == group_id) {
            Some(entry) => {
                entry.multiplier = multiplier;
                entry.enabled = enabled;
            }
            None => self.groups.push(GroupMultiplier {
                group_id: group_id.to_string(),
                multiplier,
                enabled,
            }),
        }
    }

    /// Resolves the multipliers for a vendor under a contractor group.
    ///
    /// Unknown vendors and groups, disabled group multipliers and
    /// non-positive stored values all resolve to `1.0`.
    pub fn resolve(&self, vendor_id: &str, contract_group_id: Option<&str>) -> Multipliers {
        let cost = self
            .vendors
            .iter()
            .find(|v| v.vendor_id == vendor_id)
            .map(|v| v.cost_multiplier)
            .filter(|m| m.is_sign_positive() && !m.is_zero())
            .unwrap_or(Decimal::ONE);

        let customer = contract_group_id
            .and_then(|id| self.groups.iter().find(|g| g.group_id == id))
            .filter(|g| g.enabled)
            .map(|g| g.multiplier)
            .filter(|m| m.is_sign_positive() && !m.is_zero())
            .unwrap_or(Decimal::ONE);

        debug!(vendor_id, ?contract_group_id, %cost, %customer, "resolved multipliers");

        Multipliers { cost, customer }
    }
}

/// Rejects zero and negative multipliers before they are stored.
pub fn ensure_positive(scope: &str, value: Decimal) -> Result<Decimal, ProposalError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(value)
    } else {
        Err(ProposalError::InvalidMultiplier {
            scope: scope.to_string(),
            value,
        })
    }
}
