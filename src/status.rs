//! Proposal status machine and transition validation
use std::fmt;
use std::str::FromStr;

use super::error::ProposalError;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum ProposalStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Sent,
    #[n(2)]
    Accepted,
    #[n(3)]
    Rejected,
    #[n(4)]
    Expired,
}

/// A user or system request against a proposal. Every action except
/// `Update` names the status it moves the proposal to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Send,
    Accept,
    Reject,
    Expire,
    Restart,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Allowed,
    Denied(String),
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 5] = [
        ProposalStatus::Draft,
        ProposalStatus::Sent,
        ProposalStatus::Accepted,
        ProposalStatus::Rejected,
        ProposalStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Sent => "sent",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
        }
    }

    /// Statuses reachable from `self` through an explicit transition.
    pub fn allowed_targets(&self) -> &'static [ProposalStatus] {
        match self {
            ProposalStatus::Draft => &[ProposalStatus::Sent, ProposalStatus::Rejected],
            ProposalStatus::Sent => &[
                ProposalStatus::Accepted,
                ProposalStatus::Rejected,
                ProposalStatus::Expired,
            ],
            ProposalStatus::Accepted => &[],
            ProposalStatus::Rejected => &[ProposalStatus::Draft],
            ProposalStatus::Expired => &[ProposalStatus::Draft],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Folds the historical status spellings onto the canonical five.
    /// An absent or blank status is a draft.
    pub fn normalize(raw: Option<&str>) -> Result<Self, ProposalError> {
        let Some(raw) = raw else {
            return Ok(ProposalStatus::Draft);
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "draft" | "measurement scheduled" | "measurement done" | "design scheduled"
            | "design done" => Ok(ProposalStatus::Draft),
            "sent" | "proposal done" | "follow up 1" | "follow up 2" | "follow up 3" => {
                Ok(ProposalStatus::Sent)
            }
            "accepted" | "proposal accepted" => Ok(ProposalStatus::Accepted),
            "rejected" | "proposal rejected" => Ok(ProposalStatus::Rejected),
            "expired" => Ok(ProposalStatus::Expired),
            _ => Err(ProposalError::UnknownStatus(raw.to_string())),
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ProposalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::normalize(Some(s))
    }
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Send,
        Action::Accept,
        Action::Reject,
        Action::Expire,
        Action::Restart,
        Action::Update,
    ];

    pub fn target(&self) -> Option<ProposalStatus> {
        match self {
            Action::Send => Some(ProposalStatus::Sent),
            Action::Accept => Some(ProposalStatus::Accepted),
            Action::Reject => Some(ProposalStatus::Rejected),
            Action::Expire => Some(ProposalStatus::Expired),
            Action::Restart => Some(ProposalStatus::Draft),
            Action::Update => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Send => "send",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Expire => "expire",
            Action::Restart => "restart",
            Action::Update => "update",
        }
    }

    /// Status the action leads to from `current`; `Update` keeps it.
    pub fn requested_from(&self, current: ProposalStatus) -> ProposalStatus {
        self.target().unwrap_or(current)
    }
}

impl Transition {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Transition::Allowed)
    }

    pub fn into_result(
        self,
        from: ProposalStatus,
        to: ProposalStatus,
    ) -> Result<(), ProposalError> {
        match self {
            Transition::Allowed => Ok(()),
            Transition::Denied(reason) => Err(ProposalError::InvalidTransition { from, to, reason }),
        }
    }
}

/// Decides whether `current -> requested` is legal for `action`.
///
/// Staying on the same status is always allowed so that plain edits pass.
pub fn validate(current: ProposalStatus, requested: ProposalStatus, action: Action) -> Transition {
    if let Some(target) = action.target() {
        if target != requested {
            return Transition::Denied(format!(
                "action '{}' leads to {target}, not {requested}",
                action.as_str()
            ));
        }
    }

    if current == requested || current.allowed_targets().contains(&requested) {
        return Transition::Allowed;
    }

    Transition::Denied(format!(
        "{current} -> {requested} is not in the allowed set {:?}",
        current
            .allowed_targets()
            .iter()
            .map(ProposalStatus::as_str)
            .collect::<Vec<_>>()
    ))
}
