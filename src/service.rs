//! Service layer API for proposal workflow operations
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sled::Db;
use sled::transaction::ConflictableTransactionError;
use tracing::{debug, info, warn};

use super::aggregate::{Summary, aggregate, refresh_group_summaries};
use super::config::ServiceConfig;
use super::error::ProposalError;
use super::intake;
use super::lock::{AcceptOutcome, SnapshotLock, lock_is_consistent};
use super::multiplier::{MultiplierBook, ensure_positive};
use super::proposal::{Proposal, ProposalPatch, SignerInfo};
use super::snapshot::{OrderIdentity, OrderSnapshot};
use super::status::{Action, ProposalStatus, validate};
use super::store::{self, abort_on, flatten, proposal_key};
use super::types::TimeStamp;

pub struct ProposalService {
    instance: Arc<sled::Db>,
    config: ServiceConfig,
}

impl ProposalService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_config(instance, ServiceConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: ServiceConfig) -> Self {
        Self { instance, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn db(&self) -> &Db {
        &self.instance
    }

    /// Stores a new unlocked proposal with fresh group summaries.
    ///
    /// Acceptance data only comes out of the price lock, so a proposal
    /// arriving here accepted, locked or carrying snapshots is refused. One
    /// created as sent without a send time is stamped now.
    pub fn create_proposal(&self, mut proposal: Proposal) -> anyhow::Result<Proposal> {
        if proposal.is_locked || !lock_is_consistent(&proposal) {
            warn!(proposal_id = %proposal.id, "create refused, proposal carries lock data");
            return Err(ProposalError::AcceptOutsideLock.into());
        }

        if proposal.status == ProposalStatus::Sent && proposal.sent_at.is_none() {
            proposal.sent_at = Some(TimeStamp::new());
        }

        let book = MultiplierBook::load_from_db(self.db())?;
        refresh_group_summaries(&mut proposal, &book);

        let bytes = store::encode(&proposal, "proposal")?;
        self.instance
            .compare_and_swap(proposal_key(&proposal.id), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| anyhow::anyhow!("Proposal {} already exists", proposal.id))?;

        info!(proposal_id = %proposal.id, status = %proposal.status, "proposal created");
        Ok(proposal)
    }

    pub fn get_proposal(&self, id: &str) -> anyhow::Result<Proposal> {
        Ok(Proposal::load_from_db(self.db(), id)?)
    }

    /// All proposals, optionally only those in `status`.
    pub fn list_proposals(&self, status: Option<ProposalStatus>) -> anyhow::Result<Vec<Proposal>> {
        let proposals = store::list_proposals(self.db())?;
        Ok(proposals
            .into_iter()
            .filter(|proposal| status.is_none_or(|status| proposal.status == status))
            .collect())
    }

    /// Applies `patch` to an unlocked proposal.
    ///
    /// A locked proposal is left untouched. A status in the patch is
    /// validated like any other transition, except that `accepted` is
    /// only reachable through [`ProposalService::accept_proposal`].
    pub fn update_proposal(&self, id: &str, patch: &ProposalPatch) -> anyhow::Result<Proposal> {
        let now = TimeStamp::new();

        let updated = self
            .instance
            .transaction(|tx| {
                let mut proposal = Proposal::load_in_tx(tx, id)?;
                if proposal.is_locked {
                    return Err(ConflictableTransactionError::Abort(ProposalError::Locked(
                        proposal.id.clone(),
                    )));
                }

                if let Some(requested) = patch.status {
                    if requested == ProposalStatus::Accepted {
                        return Err(ConflictableTransactionError::Abort(
                            ProposalError::AcceptOutsideLock,
                        ));
                    }
                    let from = proposal.status;
                    abort_on(validate(from, requested, Action::Update).into_result(from, requested))?;
                }

                patch.apply_fields(&mut proposal);
                if let Some(requested) = patch.status {
                    proposal.apply_status(requested, &now);
                }

                let book = MultiplierBook::load_in_tx(tx)?;
                refresh_group_summaries(&mut proposal, &book);
                proposal.updated_at = now.clone();

                proposal.save_in_tx(tx)?;
                Ok(proposal)
            })
            .map_err(flatten);

        match &updated {
            Ok(proposal) => info!(proposal_id = id, status = %proposal.status, "proposal updated"),
            Err(err) => warn!(proposal_id = id, error = %err, "update denied"),
        }
        Ok(updated?)
    }

    /// Replaces the vendor groups of a proposal from a loosely-typed JSON
    /// document.
    pub fn import_vendor_groups(&self, id: &str, json: &str) -> anyhow::Result<Proposal> {
        let groups = intake::parse_vendor_groups(json)?;
        debug!(proposal_id = id, groups = groups.len(), "vendor groups parsed");
        self.update_proposal(id, &ProposalPatch::new().set_vendor_groups(groups))
    }

    /// Runs `action` through the transition validator. `accept` is refused
    /// here; it has to go through the price lock.
    pub fn change_status(&self, id: &str, action: Action) -> anyhow::Result<Proposal> {
        if action == Action::Accept {
            warn!(proposal_id = id, "accept requested as a plain status change");
            return Err(ProposalError::AcceptOutsideLock.into());
        }

        let changed = self.transition(id, action, &TimeStamp::new());
        match &changed {
            Ok(proposal) => info!(
                proposal_id = id,
                action = action.as_str(),
                status = %proposal.status,
                "status changed"
            ),
            Err(err) => warn!(proposal_id = id, action = action.as_str(), error = %err, "status change denied"),
        }
        Ok(changed?)
    }

    fn transition(
        &self,
        id: &str,
        action: Action,
        now: &TimeStamp<Utc>,
    ) -> Result<Proposal, ProposalError> {
        self.instance
            .transaction(|tx| {
                let mut proposal = Proposal::load_in_tx(tx, id)?;
                if proposal.is_locked {
                    return Err(ConflictableTransactionError::Abort(ProposalError::Locked(
                        proposal.id.clone(),
                    )));
                }

                let from = proposal.status;
                let to = action.requested_from(from);
                abort_on(validate(from, to, action).into_result(from, to))?;

                proposal.apply_status(to, now);
                proposal.updated_at = now.clone();
                proposal.save_in_tx(tx)?;
                Ok(proposal)
            })
            .map_err(flatten)
    }

    /// Accepts and price-locks a proposal. Accepting an already locked
    /// proposal returns the existing order identity.
    pub fn accept_proposal(&self, id: &str, signer: SignerInfo) -> anyhow::Result<OrderIdentity> {
        Ok(self.accept(id, &signer, None)?.into_identity())
    }

    /// Like [`ProposalService::accept_proposal`], but denied when the grand
    /// total the signer was shown no longer matches the recomputed one.
    pub fn accept_quoted(
        &self,
        id: &str,
        signer: SignerInfo,
        quoted_total: Decimal,
    ) -> anyhow::Result<OrderIdentity> {
        Ok(self.accept(id, &signer, Some(quoted_total))?.into_identity())
    }

    pub fn accept(
        &self,
        id: &str,
        signer: &SignerInfo,
        quoted_total: Option<Decimal>,
    ) -> anyhow::Result<AcceptOutcome> {
        Ok(SnapshotLock::new(self.db(), &self.config).accept(id, signer, quoted_total)?)
    }

    /// Reads a stored order. Never reprices anything.
    pub fn get_order_snapshot(&self, order_id: &str) -> anyhow::Result<OrderSnapshot> {
        Ok(OrderSnapshot::load_from_db(self.db(), order_id)?)
    }

    /// Live totals for an unlocked proposal, the frozen ones once locked.
    pub fn proposal_pricing(&self, id: &str) -> anyhow::Result<Summary> {
        let proposal = self.get_proposal(id)?;
        if proposal.is_locked {
            let pricing = proposal
                .locked_pricing
                .ok_or(ProposalError::Decoding("pricing snapshot of locked proposal"))?;
            return Ok(pricing.summary);
        }

        let book = MultiplierBook::load_from_db(self.db())?;
        Ok(aggregate(&proposal, &book))
    }

    pub fn multiplier_book(&self) -> anyhow::Result<MultiplierBook> {
        Ok(MultiplierBook::load_from_db(self.db())?)
    }

    pub fn set_vendor_multiplier(&self, vendor_id: &str, cost_multiplier: Decimal) -> anyhow::Result<()> {
        let value = ensure_positive(vendor_id, cost_multiplier)?;
        self.update_book(|book| book.upsert_vendor(vendor_id, value))?;
        info!(vendor_id, %value, "vendor multiplier set");
        Ok(())
    }

    pub fn set_group_multiplier(
        &self,
        group_id: &str,
        multiplier: Decimal,
        enabled: bool,
    ) -> anyhow::Result<()> {
        let value = ensure_positive(group_id, multiplier)?;
        self.update_book(|book| book.upsert_group(group_id, value, enabled))?;
        info!(group_id, %value, enabled, "group multiplier set");
        Ok(())
    }

    fn update_book<F>(&self, change: F) -> Result<(), ProposalError>
    where
        F: Fn(&mut MultiplierBook),
    {
        self.instance
            .transaction(|tx| {
                let mut book = MultiplierBook::load_in_tx(tx)?;
                change(&mut book);
                book.save_in_tx(tx)
            })
            .map_err(flatten)
    }

    /// Expires every sent proposal whose validity window has passed by
    /// `now`. Returns the ids that were expired.
    pub fn expire_overdue(&self, now: &TimeStamp<Utc>) -> anyhow::Result<Vec<String>> {
        let validity = self.config.proposal_validity_days;
        let overdue: Vec<String> = self
            .list_proposals(Some(ProposalStatus::Sent))?
            .into_iter()
            .filter(|proposal| {
                proposal
                    .sent_at
                    .as_ref()
                    .is_some_and(|sent_at| sent_at.plus_days(validity) <= *now)
            })
            .map(|proposal| proposal.id)
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for id in overdue {
            match self.transition(&id, Action::Expire, now) {
                Ok(_) => expired.push(id),
                // accepted or moved on since the scan
                Err(err @ (ProposalError::Locked(_) | ProposalError::InvalidTransition { .. })) => {
                    debug!(proposal_id = %id, error = %err, "skipped during expiry sweep");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired overdue proposals");
        }
        Ok(expired)
    }
}
