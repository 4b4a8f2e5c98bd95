//! sled keyspace and CBOR record helpers
//!
//! Layout of the default tree:
//!
//! | key                       | value                       |
//! |---------------------------|-----------------------------|
//! | `proposal/<id>`           | [`Proposal`]                |
//! | `order/<order_id>`        | [`OrderSnapshot`]           |
//! | `order_seq/<yyyy-mm-dd>`  | big endian `u64` counter    |
//! | `multipliers`             | [`MultiplierBook`]          |
use chrono::NaiveDate;
use sled::Db;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};

use super::error::ProposalError;
use super::multiplier::MultiplierBook;
use super::proposal::Proposal;
use super::snapshot::OrderSnapshot;

pub const PROPOSAL_PREFIX: &str = "proposal/";
pub const ORDER_PREFIX: &str = "order/";
pub const MULTIPLIER_KEY: &str = "multipliers";

pub fn proposal_key(id: &str) -> String {
    format!("{PROPOSAL_PREFIX}{id}")
}

pub fn order_key(order_id: &str) -> String {
    format!("{ORDER_PREFIX}{order_id}")
}

pub fn order_seq_key(date: NaiveDate) -> String {
    format!("order_seq/{}", date.format("%Y-%m-%d"))
}

pub fn encode<T: minicbor::Encode<()>>(value: &T, what: &'static str) -> Result<Vec<u8>, ProposalError> {
    minicbor::to_vec(value).map_err(|_| ProposalError::Encoding(what))
}

pub fn decode<T>(bytes: &[u8], what: &'static str) -> Result<T, ProposalError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|_| ProposalError::Decoding(what))
}

/// Lifts a domain error into a transaction abort.
pub fn abort_on<T>(result: Result<T, ProposalError>) -> ConflictableTransactionResult<T, ProposalError> {
    result.map_err(ConflictableTransactionError::Abort)
}

pub fn flatten(err: TransactionError<ProposalError>) -> ProposalError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => ProposalError::Storage(e),
    }
}

impl Proposal {
    pub fn load_from_db(db: &Db, id: &str) -> Result<Self, ProposalError> {
        let bytes = db
            .get(proposal_key(id))?
            .ok_or_else(|| ProposalError::NotFound(id.to_string()))?;
        decode(&bytes, "proposal")
    }

    pub fn save_to_db(&self, db: &Db) -> Result<(), ProposalError> {
        db.insert(proposal_key(&self.id), encode(self, "proposal")?)?;
        Ok(())
    }

    pub fn load_in_tx(tx: &TransactionalTree, id: &str) -> ConflictableTransactionResult<Self, ProposalError> {
        let bytes = tx.get(proposal_key(id))?;
        let bytes = abort_on(bytes.ok_or_else(|| ProposalError::NotFound(id.to_string())))?;
        abort_on(decode(&bytes, "proposal"))
    }

    pub fn save_in_tx(&self, tx: &TransactionalTree) -> ConflictableTransactionResult<(), ProposalError> {
        tx.insert(proposal_key(&self.id).as_bytes(), abort_on(encode(self, "proposal"))?)?;
        Ok(())
    }
}

impl MultiplierBook {
    /// An absent book is an empty one: every multiplier resolves to `1.0`.
    pub fn load_from_db(db: &Db) -> Result<Self, ProposalError> {
        match db.get(MULTIPLIER_KEY)? {
            Some(bytes) => decode(&bytes, "multiplier book"),
            None => Ok(MultiplierBook::default()),
        }
    }

    pub fn save_to_db(&self, db: &Db) -> Result<(), ProposalError> {
        db.insert(MULTIPLIER_KEY, encode(self, "multiplier book")?)?;
        Ok(())
    }

    pub fn load_in_tx(tx: &TransactionalTree) -> ConflictableTransactionResult<Self, ProposalError> {
        match tx.get(MULTIPLIER_KEY)? {
            Some(bytes) => abort_on(decode(&bytes, "multiplier book")),
            None => Ok(MultiplierBook::default()),
        }
    }

    pub fn save_in_tx(&self, tx: &TransactionalTree) -> ConflictableTransactionResult<(), ProposalError> {
        tx.insert(MULTIPLIER_KEY, abort_on(encode(self, "multiplier book"))?)?;
        Ok(())
    }
}

impl OrderSnapshot {
    pub fn load_from_db(db: &Db, order_id: &str) -> Result<Self, ProposalError> {
        let bytes = db
            .get(order_key(order_id))?
            .ok_or_else(|| ProposalError::OrderNotFound(order_id.to_string()))?;
        decode(&bytes, "order")
    }

    pub fn save_in_tx(&self, tx: &TransactionalTree) -> ConflictableTransactionResult<(), ProposalError> {
        tx.insert(
            order_key(&self.identity.order_id).as_bytes(),
            abort_on(encode(self, "order"))?,
        )?;
        Ok(())
    }
}

/// Bumps and returns the order sequence for `date`.
pub fn next_order_seq(tx: &TransactionalTree, date: NaiveDate) -> ConflictableTransactionResult<u64, ProposalError> {
    let key = order_seq_key(date);
    let current = match tx.get(key.as_bytes())? {
        Some(bytes) => {
            let raw = abort_on(
                <[u8; 8]>::try_from(&bytes[..])
                    .map_err(|_| ProposalError::Decoding("order sequence")),
            )?;
            u64::from_be_bytes(raw)
        }
        None => 0,
    };

    let next = current + 1;
    tx.insert(key.as_bytes(), &next.to_be_bytes()[..])?;
    Ok(next)
}

pub fn list_proposals(db: &Db) -> Result<Vec<Proposal>, ProposalError> {
    db.scan_prefix(PROPOSAL_PREFIX)
        .values()
        .map(|value| decode(&value?, "proposal"))
        .collect()
}

pub fn count_orders(db: &Db) -> usize {
    db.scan_prefix(ORDER_PREFIX).count()
}
