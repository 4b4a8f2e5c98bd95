/// Knobs for [`crate::service::ProposalService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Leading part of human order numbers, `NJ-001-101826`.
    pub order_number_prefix: String,
    /// Days a sent proposal stays open before the expiry sweep closes it.
    pub proposal_validity_days: i64,
    /// Deny an accept whose quoted grand total differs from the recomputed one.
    pub verify_quoted_total: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            order_number_prefix: "NJ".to_string(),
            proposal_validity_days: 30,
            verify_quoted_total: true,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_order_number_prefix(mut self, prefix: &str) -> Self {
        self.order_number_prefix = prefix.to_string();
        self
    }
    pub fn set_proposal_validity_days(mut self, days: i64) -> Self {
        self.proposal_validity_days = days;
        self
    }
    pub fn set_verify_quoted_total(mut self, verify: bool) -> Self {
        self.verify_quoted_total = verify;
        self
    }
}
