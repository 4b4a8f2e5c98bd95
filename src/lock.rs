//! Accept-time price lock
//!
//! Accepting a proposal re-prices it once, freezes the result into a
//! snapshot and flips the proposal to a locked `accepted` state. All of it
//! happens inside one sled transaction, so two racing accepts serialize:
//! the loser re-reads the proposal, finds it locked and hands back the
//! winner's order identity.
use rust_decimal::Decimal;
use sled::Db;
use sled::transaction::ConflictableTransactionError;
use tracing::{info, warn};

use super::aggregate::price_proposal;
use super::config::ServiceConfig;
use super::error::ProposalError;
use super::multiplier::MultiplierBook;
use super::pricing::round_money;
use super::proposal::{Proposal, SignerInfo};
use super::snapshot::{OrderIdentity, OrderSnapshot, PricingSnapshot, format_order_number};
use super::status::{Action, ProposalStatus, validate};
use super::store::{abort_on, flatten, next_order_seq};
use super::types::TimeStamp;
use super::utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This call created the snapshot.
    Locked(OrderIdentity),
    /// The proposal was already locked; nothing was recomputed.
    AlreadyLocked(OrderIdentity),
}

impl AcceptOutcome {
    pub fn identity(&self) -> &OrderIdentity {
        match self {
            AcceptOutcome::Locked(identity) | AcceptOutcome::AlreadyLocked(identity) => identity,
        }
    }

    pub fn into_identity(self) -> OrderIdentity {
        match self {
            AcceptOutcome::Locked(identity) | AcceptOutcome::AlreadyLocked(identity) => identity,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, AcceptOutcome::Locked(_))
    }
}

pub struct SnapshotLock<'a> {
    db: &'a Db,
    config: &'a ServiceConfig,
}

impl<'a> SnapshotLock<'a> {
    pub fn new(db: &'a Db, config: &'a ServiceConfig) -> Self {
        Self { db, config }
    }

    /// Locks `proposal_id` for `signer`.
    ///
    /// With `quoted_total` set, the recomputed grand total has to match it
    /// (to the cent) or the accept is denied.
    pub fn accept(
        &self,
        proposal_id: &str,
        signer: &SignerInfo,
        quoted_total: Option<Decimal>,
    ) -> Result<AcceptOutcome, ProposalError> {
        let order_id = utils::new_order_id()?;
        let now = TimeStamp::new();

        let outcome = self
            .db
            .transaction(|tx| {
                let mut proposal = Proposal::load_in_tx(tx, proposal_id)?;

                if proposal.is_locked {
                    return match &proposal.order_snapshot {
                        Some(order) => Ok(AcceptOutcome::AlreadyLocked(order.identity.clone())),
                        None => Err(ConflictableTransactionError::Abort(
                            ProposalError::Decoding("order snapshot of locked proposal"),
                        )),
                    };
                }

                let from = proposal.status;
                abort_on(
                    validate(from, ProposalStatus::Accepted, Action::Accept)
                        .into_result(from, ProposalStatus::Accepted),
                )?;

                let book = MultiplierBook::load_in_tx(tx)?;
                let priced = price_proposal(&proposal, &book);

                if let Some(quoted) = quoted_total {
                    let computed = priced.summary.grand_total;
                    if self.config.verify_quoted_total && round_money(quoted) != computed {
                        return Err(ConflictableTransactionError::Abort(
                            ProposalError::QuoteMismatch { quoted, computed },
                        ));
                    }
                }

                let pricing = PricingSnapshot::capture(&proposal, &priced, &now);
                let date = now.date();
                let seq = next_order_seq(tx, date)?;
                let identity = OrderIdentity {
                    order_id: order_id.clone(),
                    order_number: format_order_number(&self.config.order_number_prefix, seq, date),
                    proposal_id: proposal.id.clone(),
                    pricing_digest: abort_on(pricing.digest())?,
                };
                let order = abort_on(OrderSnapshot::new(
                    identity.clone(),
                    &proposal,
                    signer.clone(),
                    pricing.clone(),
                ))?;

                for (group, priced_group) in proposal.vendor_groups.iter_mut().zip(&priced.groups) {
                    group.summary = Some(priced_group.summary.clone());
                }
                proposal.apply_status(ProposalStatus::Accepted, &now);
                proposal.is_locked = true;
                proposal.accepted_at = Some(now.clone());
                proposal.accepted_by = Some(signer.clone());
                proposal.updated_at = now.clone();
                proposal.locked_pricing = Some(pricing);
                proposal.order_snapshot = Some(order.clone());

                proposal.save_in_tx(tx)?;
                order.save_in_tx(tx)?;

                Ok(AcceptOutcome::Locked(identity))
            })
            .map_err(flatten);

        match &outcome {
            Ok(AcceptOutcome::Locked(identity)) => info!(
                proposal_id,
                order_id = %identity.order_id,
                order_number = %identity.order_number,
                "proposal accepted and price locked"
            ),
            Ok(AcceptOutcome::AlreadyLocked(identity)) => info!(
                proposal_id,
                order_id = %identity.order_id,
                "proposal already locked, returning existing order"
            ),
            Err(err) => warn!(proposal_id, error = %err, "accept denied"),
        }

        outcome
    }
}

/// Whether a proposal honours the lock invariant: locked exactly when
/// accepted, and locked exactly when both snapshots and the acceptance
/// stamp are present.
pub fn lock_is_consistent(proposal: &Proposal) -> bool {
    let accepted = proposal.status == ProposalStatus::Accepted;
    let lock_data = [
        proposal.locked_pricing.is_some(),
        proposal.order_snapshot.is_some(),
        proposal.accepted_at.is_some(),
        proposal.accepted_by.is_some(),
    ];

    match proposal.is_locked {
        true => accepted && lock_data.iter().all(|present| *present),
        false => !accepted && lock_data.iter().all(|present| !present),
    }
}
