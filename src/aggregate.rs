//! Proposal aggregation: lines into vendor group summaries, groups into the
//! proposal summary.
//!
//! Everything here is pure. The same proposal and multiplier book always
//! produce the same summary, which is what lets a lock recompute the
//! figures the customer was shown and compare them.
use rust_decimal::Decimal;
use tracing::debug;

use super::multiplier::{MultiplierBook, Multipliers};
use super::pricing::{LinePrice, price_line, round_money};
use super::proposal::{Proposal, VendorGroup};

/// Totals for a vendor group or a whole proposal, rounded to cents.
///
/// `grand_total = style_total + assembly_fee + modifications_cost
///     - discount_amount + tax_amount`, taken over unrounded parts.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    #[n(0)]
    #[cbor(with = "crate::types::decimal")]
    pub style_total: Decimal,
    #[n(1)]
    #[cbor(with = "crate::types::decimal")]
    pub assembly_fee: Decimal,
    #[n(2)]
    #[cbor(with = "crate::types::decimal")]
    pub modifications_cost: Decimal,
    #[n(3)]
    #[cbor(with = "crate::types::decimal")]
    pub discount_amount: Decimal,
    #[n(4)]
    #[cbor(with = "crate::types::decimal")]
    pub tax_amount: Decimal,
    #[n(5)]
    #[cbor(with = "crate::types::decimal")]
    pub grand_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedGroup {
    pub vendor_id: String,
    pub style_id: Option<String>,
    pub multipliers: Multipliers,
    pub lines: Vec<LinePrice>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedProposal {
    pub groups: Vec<PricedGroup>,
    pub summary: Summary,
}

// unrounded running sums
#[derive(Default, Clone, Copy)]
struct Totals {
    style: Decimal,
    assembly: Decimal,
    modifications: Decimal,
}

impl Totals {
    fn add(&mut self, line: &LinePrice) {
        self.style = self.style.saturating_add(line.extended_price);
        self.assembly = self.assembly.saturating_add(line.assembly_cost);
        self.modifications = self.modifications.saturating_add(line.modifications_total);
    }

    fn merge(&mut self, other: &Totals) {
        self.style = self.style.saturating_add(other.style);
        self.assembly = self.assembly.saturating_add(other.assembly);
        self.modifications = self.modifications.saturating_add(other.modifications);
    }

    fn summarize(&self, discount: Decimal, tax: Decimal) -> Summary {
        let grand = self
            .style
            .saturating_add(self.assembly)
            .saturating_add(self.modifications)
            .saturating_sub(discount)
            .saturating_add(tax);
        Summary {
            style_total: round_money(self.style),
            assembly_fee: round_money(self.assembly),
            modifications_cost: round_money(self.modifications),
            discount_amount: round_money(discount),
            tax_amount: round_money(tax),
            grand_total: round_money(grand),
        }
    }
}

fn price_group(group: &VendorGroup, multipliers: Multipliers) -> (PricedGroup, Totals) {
    let mut totals = Totals::default();
    let lines: Vec<LinePrice> = group
        .items
        .iter()
        .map(|item| {
            let line = price_line(item, &multipliers);
            totals.add(&line);
            line
        })
        .collect();

    let priced = PricedGroup {
        vendor_id: group.vendor_id.clone(),
        style_id: group.style_id.clone(),
        multipliers,
        lines,
        summary: totals.summarize(Decimal::ZERO, Decimal::ZERO),
    };
    (priced, totals)
}

/// Prices every line of every vendor group. Discount and tax apply at
/// proposal level only; group summaries carry them as zero.
pub fn price_proposal(proposal: &Proposal, book: &MultiplierBook) -> PricedProposal {
    let group_id = proposal.owner_group_id.as_deref();
    let mut totals = Totals::default();

    let groups = proposal
        .vendor_groups
        .iter()
        .map(|group| {
            let multipliers = book.resolve(&group.vendor_id, group_id);
            let (priced, group_totals) = price_group(group, multipliers);
            totals.merge(&group_totals);
            priced
        })
        .collect();

    let summary = totals.summarize(proposal.discount, proposal.tax);
    debug!(proposal_id = %proposal.id, grand_total = %summary.grand_total, "aggregated proposal");

    PricedProposal { groups, summary }
}

pub fn aggregate(proposal: &Proposal, book: &MultiplierBook) -> Summary {
    price_proposal(proposal, book).summary
}

/// Rewrites the cached summary on each vendor group.
pub fn refresh_group_summaries(proposal: &mut Proposal, book: &MultiplierBook) {
    let priced = price_proposal(proposal, book);
    for (group, priced_group) in proposal.vendor_groups.iter_mut().zip(priced.groups) {
        group.summary = Some(priced_group.summary);
    }
}
