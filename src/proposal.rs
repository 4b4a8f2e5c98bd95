//! Proposal data model: vendor groups, line items and modifications
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::warn;

use super::aggregate::Summary;
use super::snapshot::{OrderSnapshot, PricingSnapshot};
use super::status::ProposalStatus;
use super::types::TimeStamp;
use super::utils;

/// Hinge or exposed side of a cabinet. Carried through to the order as-is.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    #[n(0)]
    Left,
    #[n(1)]
    Right,
    #[n(2)]
    Both,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyFee {
    /// Fixed amount per unit, independent of any multiplier.
    #[n(0)]
    Flat {
        #[n(0)]
        #[cbor(with = "crate::types::decimal")]
        per_unit: Decimal,
    },
    /// Percentage of the customer unit price, after multipliers.
    #[n(1)]
    Percentage {
        #[n(0)]
        #[cbor(with = "crate::types::decimal")]
        percent: Decimal,
    },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ModOption {
    #[n(0)]
    pub key: String,
    #[n(1)]
    pub value: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    #[n(0)]
    pub name: String,
    #[n(1)]
    #[cbor(with = "crate::types::decimal")]
    pub unit_price: Decimal,
    #[n(2)]
    pub quantity: u32,
    // display only, never priced
    #[n(3)]
    pub options: Vec<ModOption>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    #[n(0)]
    pub code: String,
    #[n(1)]
    pub quantity: u32,
    #[n(2)]
    #[cbor(with = "crate::types::decimal")]
    pub catalog_price: Decimal,
    #[n(3)]
    pub include_assembly_fee: bool,
    #[n(4)]
    pub is_row_assembled: bool,
    #[n(5)]
    pub assembly_fee: Option<AssemblyFee>,
    #[n(6)]
    pub hinge_side: Option<Side>,
    #[n(7)]
    pub exposed_side: Option<Side>,
    #[n(8)]
    pub modifications: Vec<Modification>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VendorGroup {
    #[n(0)]
    pub vendor_id: String,
    #[n(1)]
    pub style_id: Option<String>,
    #[n(2)]
    pub items: Vec<LineItem>,
    // cached, recomputed on every save while unlocked
    #[n(3)]
    pub summary: Option<Summary>,
}

/// Who accepted the proposal. External signers accept through a shared
/// link and have no account.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum SignerInfo {
    #[n(0)]
    Account {
        #[n(0)]
        user_id: String,
    },
    #[n(1)]
    External {
        #[n(0)]
        name: String,
        #[n(1)]
        email: Option<String>,
    },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Proposal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub status: ProposalStatus,
    #[n(2)]
    pub description: String,
    #[n(3)]
    pub vendor_groups: Vec<VendorGroup>,
    #[n(4)]
    #[cbor(with = "crate::types::decimal")]
    pub discount: Decimal,
    #[n(5)]
    #[cbor(with = "crate::types::decimal")]
    pub tax: Decimal,
    #[n(6)]
    pub owner_group_id: Option<String>,
    #[n(7)]
    pub created_by: Option<String>,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
    #[n(10)]
    pub sent_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub accepted_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub accepted_by: Option<SignerInfo>,
    #[n(13)]
    pub is_locked: bool,
    #[n(14)]
    pub locked_pricing: Option<PricingSnapshot>,
    #[n(15)]
    pub order_snapshot: Option<OrderSnapshot>,
}

/// A partial edit. Fields left as `None` are untouched.
#[derive(Debug, Clone, Default)]
pub struct ProposalPatch {
    pub description: Option<String>,
    pub status: Option<ProposalStatus>,
    pub vendor_groups: Option<Vec<VendorGroup>>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub owner_group_id: Option<String>,
}

impl Side {
    /// Lenient parse of the side selectors found in catalog data.
    /// `N/A` and blanks mean no side.
    pub fn parse(raw: &str) -> Option<Side> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "l" | "left" => Some(Side::Left),
            "r" | "right" => Some(Side::Right),
            "b" | "both" => Some(Side::Both),
            _ => None,
        }
    }
}

impl Modification {
    pub fn new(name: &str, unit_price: Decimal) -> Self {
        Self {
            name: name.to_string(),
            unit_price,
            quantity: 1,
            options: vec![],
        }
    }
    pub fn set_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
    pub fn add_option(mut self, key: &str, value: &str) -> Self {
        self.options.push(ModOption {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }
    pub fn total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

impl LineItem {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            quantity: 0,
            catalog_price: Decimal::ZERO,
            include_assembly_fee: false,
            is_row_assembled: false,
            assembly_fee: None,
            hinge_side: None,
            exposed_side: None,
            modifications: vec![],
        }
    }
    pub fn set_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
    /// Negative catalog prices are stored as zero.
    pub fn set_catalog_price(mut self, price: Decimal) -> Self {
        if price.is_sign_negative() && !price.is_zero() {
            warn!(code = %self.code, %price, "negative catalog price coerced to zero");
            self.catalog_price = Decimal::ZERO;
        } else {
            self.catalog_price = price;
        }
        self
    }
    /// Sets the fee and opts the line into it.
    pub fn set_assembly_fee(mut self, fee: AssemblyFee) -> Self {
        self.assembly_fee = Some(fee);
        self.include_assembly_fee = true;
        self
    }
    pub fn include_assembly_fee(mut self, include: bool) -> Self {
        self.include_assembly_fee = include;
        self
    }
    pub fn set_row_assembled(mut self, assembled: bool) -> Self {
        self.is_row_assembled = assembled;
        self
    }
    pub fn set_hinge_side(mut self, side: Side) -> Self {
        self.hinge_side = Some(side);
        self
    }
    pub fn set_exposed_side(mut self, side: Side) -> Self {
        self.exposed_side = Some(side);
        self
    }
    pub fn add_modification(mut self, modification: Modification) -> Self {
        self.modifications.push(modification);
        self
    }
}

impl VendorGroup {
    pub fn new(vendor_id: &str) -> Self {
        Self {
            vendor_id: vendor_id.to_string(),
            style_id: None,
            items: vec![],
            summary: None,
        }
    }
    pub fn set_style(mut self, style_id: &str) -> Self {
        self.style_id = Some(style_id.to_string());
        self
    }
    pub fn add_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }
}

impl SignerInfo {
    pub fn account(user_id: &str) -> Self {
        SignerInfo::Account {
            user_id: user_id.to_string(),
        }
    }
    pub fn external(name: &str, email: Option<&str>) -> Self {
        SignerInfo::External {
            name: name.to_string(),
            email: email.map(str::to_string),
        }
    }
}

impl Proposal {
    /// A fresh draft with a generated `proposal_` id.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::new_with(utils::new_proposal_id()?))
    }
    pub fn new_with(id: String) -> Self {
        let now = TimeStamp::new();
        Self {
            id,
            status: ProposalStatus::Draft,
            description: String::new(),
            vendor_groups: vec![],
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            owner_group_id: None,
            created_by: None,
            created_at: now.clone(),
            updated_at: now,
            sent_at: None,
            accepted_at: None,
            accepted_by: None,
            is_locked: false,
            locked_pricing: None,
            order_snapshot: None,
        }
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
    pub fn set_owner_group(mut self, group_id: &str) -> Self {
        self.owner_group_id = Some(group_id.to_string());
        self
    }
    pub fn set_created_by(mut self, user_id: &str) -> Self {
        self.created_by = Some(user_id.to_string());
        self
    }
    pub fn set_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }
    pub fn set_tax(mut self, tax: Decimal) -> Self {
        self.tax = tax;
        self
    }
    pub fn add_vendor_group(mut self, group: VendorGroup) -> Self {
        self.vendor_groups.push(group);
        self
    }

    /// Moves to `status` and stamps the lifecycle timestamps that go with
    /// it. Validation is the caller's job.
    pub fn apply_status(&mut self, status: ProposalStatus, now: &TimeStamp<Utc>) {
        if status == self.status {
            return;
        }
        match status {
            ProposalStatus::Sent => self.sent_at = Some(now.clone()),
            ProposalStatus::Draft => self.sent_at = None,
            _ => {}
        }
        self.status = status;
    }
}

impl ProposalPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_vendor_groups(mut self, groups: Vec<VendorGroup>) -> Self {
        self.vendor_groups = Some(groups);
        self
    }
    pub fn set_discount(mut self, discount: Decimal) -> Self {
        self.discount = Some(discount);
        self
    }
    pub fn set_tax(mut self, tax: Decimal) -> Self {
        self.tax = Some(tax);
        self
    }
    pub fn set_owner_group(mut self, group_id: &str) -> Self {
        self.owner_group_id = Some(group_id.to_string());
        self
    }

    /// Applies every non-status field. The status is applied separately
    /// once it has been validated.
    pub fn apply_fields(&self, proposal: &mut Proposal) {
        if let Some(description) = &self.description {
            proposal.description = description.clone();
        }
        if let Some(groups) = &self.vendor_groups {
            proposal.vendor_groups = groups.clone();
        }
        if let Some(discount) = self.discount {
            proposal.discount = discount;
        }
        if let Some(tax) = self.tax {
            proposal.tax = tax;
        }
        if let Some(group_id) = &self.owner_group_id {
            proposal.owner_group_id = Some(group_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_proposal_is_an_unlocked_draft() {
        let proposal = Proposal::new().unwrap();

        assert!(proposal.id.starts_with("proposal_1"));
        assert_eq!(proposal.status, ProposalStatus::Draft);
        assert!(!proposal.is_locked);
        assert!(proposal.locked_pricing.is_none());
        assert!(proposal.order_snapshot.is_none());
    }

    #[test]
    fn negative_catalog_price_becomes_zero() {
        let item = LineItem::new("B24").set_catalog_price(Decimal::new(-500, 2));
        assert_eq!(item.catalog_price, Decimal::ZERO);
    }

    #[test]
    fn modification_defaults_to_single_quantity() {
        let modification = Modification::new("Finished end", Decimal::new(25, 0));
        assert_eq!(modification.quantity, 1);
        assert_eq!(modification.total(), Decimal::new(25, 0));
    }

    #[test]
    fn side_parse_is_lenient() {
        assert_eq!(Side::parse("L"), Some(Side::Left));
        assert_eq!(Side::parse(" right "), Some(Side::Right));
        assert_eq!(Side::parse("N/A"), None);
    }

    #[test]
    fn restart_clears_sent_at() {
        let mut proposal = Proposal::new_with("proposal_test".into());
        let now = TimeStamp::new();

        proposal.apply_status(ProposalStatus::Sent, &now);
        assert!(proposal.sent_at.is_some());

        proposal.apply_status(ProposalStatus::Expired, &now);
        proposal.apply_status(ProposalStatus::Draft, &now);
        assert!(proposal.sent_at.is_none());
    }

    #[test]
    fn cbor_roundtrip_keeps_line_detail() {
        let proposal = Proposal::new_with("proposal_test".into()).add_vendor_group(
            VendorGroup::new("vendor_a").add_item(
                LineItem::new("W3030")
                    .set_quantity(2)
                    .set_catalog_price(Decimal::new(10050, 2))
                    .set_hinge_side(Side::Left)
                    .set_assembly_fee(AssemblyFee::Percentage {
                        percent: Decimal::new(10, 0),
                    })
                    .add_modification(
                        Modification::new("Depth reduction", Decimal::new(40, 0))
                            .add_option("depth", "12"),
                    ),
            ),
        );

        let encoded = minicbor::to_vec(&proposal).unwrap();
        let decoded: Proposal = minicbor::decode(&encoded).unwrap();

        assert_eq!(proposal, decoded);
    }
}
