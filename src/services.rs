//! Default collaborator implementations
//!
//! Each type implements one of the traits in [`crate::runtime::traits`].
//! Real deployments swap these for vendor-backed adapters.

mod accounts;
mod compliance;
mod console;
mod error;
mod payments;
mod transcripts;
mod twilio;

pub use accounts::StaticAccountDirectory;
pub use compliance::RegionAllowList;
pub use console::ConsoleSession;
pub use error::{ServiceError, ServiceKind};
pub use payments::KeywordNegotiator;
pub use transcripts::JsonFileSink;
pub use twilio::TwilioCallPlacer;
