//! Property-based tests for the proposal status machine
//!
//! The transition table is small enough to state outright, so these tests
//! pin `validate` against it for every status and action combination and
//! check that legacy status spellings fold onto the canonical statuses.

use proptest::prelude::*;
use proposal_approval::status::{Action, ProposalStatus, Transition, validate};

/// The seven explicit transitions; anything else must be a no-op to pass.
const ALLOWED: [(ProposalStatus, ProposalStatus); 7] = [
    (ProposalStatus::Draft, ProposalStatus::Sent),
    (ProposalStatus::Draft, ProposalStatus::Rejected),
    (ProposalStatus::Sent, ProposalStatus::Accepted),
    (ProposalStatus::Sent, ProposalStatus::Rejected),
    (ProposalStatus::Sent, ProposalStatus::Expired),
    (ProposalStatus::Rejected, ProposalStatus::Draft),
    (ProposalStatus::Expired, ProposalStatus::Draft),
];

// PROPERTY TEST STRATEGIES

fn status_strategy() -> impl Strategy<Value = ProposalStatus> {
    prop::sample::select(ProposalStatus::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

/// Random upper/lower casing of a string
fn recased(raw: &'static str) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<bool>(), raw.len()).prop_map(move |upper| {
        raw.chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect()
    })
}

// PROPERTY TESTS
proptest! {
    /// Property: validate allows exactly the table entries and same-status
    /// requests, and only when the action leads to the requested status.
    #[test]
    fn prop_validate_matches_the_table(
        current in status_strategy(),
        requested in status_strategy(),
        action in action_strategy(),
    ) {
        let action_agrees = action.target().is_none_or(|target| target == requested);
        let in_table = current == requested || ALLOWED.contains(&(current, requested));

        let outcome = validate(current, requested, action);
        prop_assert_eq!(outcome.is_allowed(), action_agrees && in_table);
    }

    /// Property: denials always explain themselves and convert into an
    /// InvalidTransition naming both ends.
    #[test]
    fn prop_denials_carry_a_reason(
        current in status_strategy(),
        requested in status_strategy(),
        action in action_strategy(),
    ) {
        if let Transition::Denied(reason) = validate(current, requested, action) {
            prop_assert!(!reason.is_empty());

            let err = Transition::Denied(reason).into_result(current, requested).unwrap_err();
            let message = err.to_string();
            prop_assert!(message.contains(current.as_str()));
            prop_assert!(message.contains(requested.as_str()));
        }
    }

    /// Property: nothing leaves accepted, whatever the action.
    #[test]
    fn prop_accepted_is_final(requested in status_strategy(), action in action_strategy()) {
        prop_assume!(requested != ProposalStatus::Accepted);
        prop_assert!(!validate(ProposalStatus::Accepted, requested, action).is_allowed());
    }

    /// Property: canonical names parse back case-insensitively.
    #[test]
    fn prop_canonical_names_parse(status in status_strategy(), seed in any::<u64>()) {
        let raw = status.as_str();
        let mixed: String = raw
            .chars()
            .enumerate()
            .map(|(i, c)| if seed >> (i % 64) & 1 == 1 { c.to_ascii_uppercase() } else { c })
            .collect();

        prop_assert_eq!(ProposalStatus::normalize(Some(mixed.as_str())).unwrap(), status);
        prop_assert_eq!(mixed.parse::<ProposalStatus>().unwrap(), status);
    }

    /// Property: follow-up stages of a sent proposal all read as sent.
    #[test]
    fn prop_follow_ups_are_sent(raw in prop_oneof![
        recased("Proposal done"),
        recased("Follow up 1"),
        recased("Follow up 2"),
        recased("Follow up 3"),
    ]) {
        prop_assert_eq!(ProposalStatus::normalize(Some(raw.as_str())).unwrap(), ProposalStatus::Sent);
    }

    /// Property: pre-proposal stages all read as draft.
    #[test]
    fn prop_early_stages_are_draft(raw in prop_oneof![
        recased("Draft"),
        recased("Measurement Scheduled"),
        recased("Measurement done"),
        recased("Design Scheduled"),
        recased("Design done"),
    ]) {
        prop_assert_eq!(ProposalStatus::normalize(Some(raw.as_str())).unwrap(), ProposalStatus::Draft);
    }
}

#[test]
fn absent_or_blank_status_is_draft() {
    assert_eq!(ProposalStatus::normalize(None).unwrap(), ProposalStatus::Draft);
    assert_eq!(ProposalStatus::normalize(Some("  ")).unwrap(), ProposalStatus::Draft);
}

#[test]
fn unrecognised_status_is_an_error() {
    assert!(ProposalStatus::normalize(Some("Invoiced")).is_err());
}
