//! Holder Lottery - periodic SOL rewards for token holders
//!
//! This library exposes the distribution job components for the binary and
//! for integration tests.

pub mod audit;
pub mod chain;
pub mod config;
pub mod distributor;
pub mod endpoints;
pub mod errors;
pub mod guard;
pub mod holders;
pub mod metrics;
pub mod notify;
pub mod payout;
pub mod selection;
pub mod store;
pub mod structured_logging;
pub mod test_utils;
pub mod token_config;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use distributor::{Distributor, DistributorSettings};
pub use types::{DistributionOutcome, DistributionRecord, RecordStatus, TriggerResponse};
