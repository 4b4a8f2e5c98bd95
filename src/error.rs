use rust_decimal::Decimal;

use crate::status::ProposalStatus;

#[derive(thiserror::Error, Debug)]
pub enum ProposalError {
    #[error("Invalid status transition {from} -> {to}: {reason}")]
    InvalidTransition {
        from: ProposalStatus,
        to: ProposalStatus,
        reason: String,
    },
    #[error("Proposal {0} is locked and can no longer be edited")]
    Locked(String),
    #[error("Proposal {0} not found")]
    NotFound(String),
    #[error("Order {0} not found")]
    OrderNotFound(String),
    #[error("Unrecognised proposal status {0:?}")]
    UnknownStatus(String),
    #[error("Acceptance must go through the price lock, not a plain status change")]
    AcceptOutsideLock,
    #[error("Quoted total {quoted} no longer matches the computed total {computed}")]
    QuoteMismatch { quoted: Decimal, computed: Decimal },
    #[error("Multiplier for {scope} must be positive, got {value}")]
    InvalidMultiplier { scope: String, value: Decimal },
    #[error("Failed to encode {0} record")]
    Encoding(&'static str),
    #[error("Failed to decode {0} record")]
    Decoding(&'static str),
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum IntakeError {
    #[error("Vendor group document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected {expected} at {path}")]
    Shape { path: String, expected: &'static str },
}
