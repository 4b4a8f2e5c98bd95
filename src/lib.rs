pub mod aggregate;
pub mod config;
pub mod error;
pub mod intake;
pub mod lock;
pub mod logging;
pub mod multiplier;
pub mod pricing;
pub mod proposal;
pub mod service;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod types;
pub mod utils;

pub use config::ServiceConfig;
pub use error::{IntakeError, ProposalError};
pub use lock::AcceptOutcome;
pub use service::ProposalService;
pub use status::{Action, ProposalStatus};
