//! Record identifiers and content digests

use bech32::Bech32m;
use uuid7::uuid7;

use super::error::ProposalError;
use super::store;

pub const PROPOSAL_HRP: &str = "proposal_";
pub const ORDER_HRP: &str = "order_";

/// Bech32m encoding of a fresh uuid7, `hrp` names the record kind.
pub fn new_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    Ok(bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?)
}

pub fn new_proposal_id() -> anyhow::Result<String> {
    new_id(PROPOSAL_HRP)
}

pub fn new_order_id() -> Result<String, ProposalError> {
    new_id(ORDER_HRP).map_err(|_| ProposalError::Encoding("order id"))
}

/// Hex sha256 of the CBOR encoding of `value`.
pub fn cbor_digest<T: minicbor::Encode<()>>(value: &T, what: &'static str) -> Result<String, ProposalError> {
    Ok(sha256::digest(&store::encode(value, what)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_prefix() {
        assert!(new_proposal_id().unwrap().starts_with("proposal_1"));
        assert!(new_order_id().unwrap().starts_with("order_1"));
    }

    #[test]
    fn digest_follows_content() {
        let a = cbor_digest(&"kitchen".to_string(), "text").unwrap();
        let b = cbor_digest(&"kitchen".to_string(), "text").unwrap();
        let c = cbor_digest(&"pantry".to_string(), "text").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
