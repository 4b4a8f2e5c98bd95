//! Write-once pricing and order snapshots
//!
//! A snapshot is a value: every price is baked in as a plain number and
//! nothing in it refers back to catalog or multiplier records.
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::aggregate::{PricedProposal, Summary};
use super::error::ProposalError;
use super::multiplier::Multipliers;
use super::proposal::{Modification, Proposal, Side, SignerInfo};
use super::types::TimeStamp;
use super::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineSnapshot {
    #[n(0)]
    pub code: String,
    #[n(1)]
    pub quantity: u32,
    #[n(2)]
    #[cbor(with = "crate::types::decimal")]
    pub catalog_price: Decimal,
    #[n(3)]
    #[cbor(with = "crate::types::decimal")]
    pub cost_unit_price: Decimal,
    #[n(4)]
    #[cbor(with = "crate::types::decimal")]
    pub unit_price: Decimal,
    #[n(5)]
    #[cbor(with = "crate::types::decimal")]
    pub assembly_cost: Decimal,
    #[n(6)]
    #[cbor(with = "crate::types::decimal")]
    pub modifications_total: Decimal,
    #[n(7)]
    #[cbor(with = "crate::types::decimal")]
    pub line_total: Decimal,
    #[n(8)]
    pub include_assembly_fee: bool,
    #[n(9)]
    pub is_row_assembled: bool,
    #[n(10)]
    pub hinge_side: Option<Side>,
    #[n(11)]
    pub exposed_side: Option<Side>,
    #[n(12)]
    pub modifications: Vec<Modification>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    #[n(0)]
    pub vendor_id: String,
    #[n(1)]
    pub style_id: Option<String>,
    #[n(2)]
    pub multipliers: Multipliers,
    #[n(3)]
    pub lines: Vec<LineSnapshot>,
    #[n(4)]
    pub summary: Summary,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PricingSnapshot {
    #[n(0)]
    pub captured_at: TimeStamp<Utc>,
    #[n(1)]
    pub groups: Vec<GroupSnapshot>,
    #[n(2)]
    pub summary: Summary,
}

/// What a caller gets back from an accept, fresh or repeated.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderIdentity {
    #[n(0)]
    pub order_id: String,
    #[n(1)]
    pub order_number: String,
    #[n(2)]
    pub proposal_id: String,
    /// sha256 of the CBOR encoded pricing snapshot
    #[n(3)]
    pub pricing_digest: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    #[n(0)]
    pub identity: OrderIdentity,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub accepted_at: TimeStamp<Utc>,
    #[n(3)]
    pub accepted_by: SignerInfo,
    #[n(4)]
    pub pricing: PricingSnapshot,
    #[n(5)]
    pub grand_total_cents: i64,
}

impl PricingSnapshot {
    /// Copies the priced proposal into plain values, lines rounded to cents.
    pub fn capture(proposal: &Proposal, priced: &PricedProposal, now: &TimeStamp<Utc>) -> Self {
        let groups = proposal
            .vendor_groups
            .iter()
            .zip(&priced.groups)
            .map(|(group, priced_group)| GroupSnapshot {
                vendor_id: priced_group.vendor_id.clone(),
                style_id: priced_group.style_id.clone(),
                multipliers: priced_group.multipliers,
                lines: group
                    .items
                    .iter()
                    .zip(&priced_group.lines)
                    .map(|(item, line)| {
                        let line = line.rounded();
                        LineSnapshot {
                            code: item.code.clone(),
                            quantity: item.quantity,
                            catalog_price: item.catalog_price,
                            cost_unit_price: line.cost_unit_price,
                            unit_price: line.unit_price,
                            assembly_cost: line.assembly_cost,
                            modifications_total: line.modifications_total,
                            line_total: line.line_total,
                            include_assembly_fee: item.include_assembly_fee,
                            is_row_assembled: item.is_row_assembled,
                            hinge_side: item.hinge_side,
                            exposed_side: item.exposed_side,
                            modifications: item.modifications.clone(),
                        }
                    })
                    .collect(),
                summary: priced_group.summary.clone(),
            })
            .collect();

        Self {
            captured_at: now.clone(),
            groups,
            summary: priced.summary.clone(),
        }
    }

    pub fn digest(&self) -> Result<String, ProposalError> {
        utils::cbor_digest(self, "pricing snapshot")
    }
}

impl OrderSnapshot {
    pub fn new(
        identity: OrderIdentity,
        proposal: &Proposal,
        accepted_by: SignerInfo,
        pricing: PricingSnapshot,
    ) -> Result<Self, ProposalError> {
        let grand_total_cents = pricing
            .summary
            .grand_total
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.trunc().to_i64())
            .ok_or(ProposalError::Encoding("order total"))?;

        Ok(Self {
            identity,
            description: proposal.description.clone(),
            accepted_at: pricing.captured_at.clone(),
            accepted_by,
            pricing,
            grand_total_cents,
        })
    }
}

/// Human order number, `<PREFIX>-<seq:03>-<MMDDYY>`.
pub fn format_order_number(prefix: &str, seq: u64, date: NaiveDate) -> String {
    format!("{prefix}-{seq:03}-{}", date.format("%m%d%y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::price_proposal;
    use crate::multiplier::MultiplierBook;
    use crate::proposal::{AssemblyFee, LineItem, VendorGroup};

    fn priced_sample() -> (Proposal, PricedProposal) {
        let proposal = Proposal::new_with("proposal_test".into()).add_vendor_group(
            VendorGroup::new("vendor_a").set_style("shaker").add_item(
                LineItem::new("B24")
                    .set_quantity(2)
                    .set_catalog_price(Decimal::new(100, 0))
                    .set_hinge_side(Side::Right)
                    .set_assembly_fee(AssemblyFee::Flat {
                        per_unit: Decimal::new(10, 0),
                    }),
            ),
        );
        let book = MultiplierBook::new().set_vendor("vendor_a", Decimal::new(12, 1));
        let priced = price_proposal(&proposal, &book);
        (proposal, priced)
    }

    #[test]
    fn capture_bakes_in_line_values() {
        let (proposal, priced) = priced_sample();
        let snapshot = PricingSnapshot::capture(&proposal, &priced, &TimeStamp::new());

        let line = &snapshot.groups[0].lines[0];
        assert_eq!(line.unit_price, Decimal::new(12000, 2));
        assert_eq!(line.assembly_cost, Decimal::new(2000, 2));
        assert_eq!(line.line_total, Decimal::new(26000, 2));
        assert_eq!(line.hinge_side, Some(Side::Right));
        assert_eq!(snapshot.groups[0].style_id.as_deref(), Some("shaker"));
        assert_eq!(snapshot.summary, priced.summary);
    }

    #[test]
    fn digest_is_stable_for_equal_snapshots() {
        let (proposal, priced) = priced_sample();
        let now = TimeStamp::new();
        let a = PricingSnapshot::capture(&proposal, &priced, &now);
        let b = PricingSnapshot::capture(&proposal, &priced, &now);

        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);
    }

    #[test]
    fn order_total_is_stored_in_cents() {
        let (proposal, priced) = priced_sample();
        let pricing = PricingSnapshot::capture(&proposal, &priced, &TimeStamp::new());
        let identity = OrderIdentity {
            order_id: "order_test".into(),
            order_number: "NJ-001-101826".into(),
            proposal_id: proposal.id.clone(),
            pricing_digest: pricing.digest().unwrap(),
        };

        let order =
            OrderSnapshot::new(identity, &proposal, SignerInfo::account("user_1"), pricing)
                .unwrap();
        assert_eq!(order.grand_total_cents, 26_000);
    }

    #[test]
    fn order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(format_order_number("NJ", 1, date), "NJ-001-101826");
        assert_eq!(format_order_number("NJ", 1234, date), "NJ-1234-101826");
    }
}
