//! Whale analysis engine.
//!
//! Whale selection feeds reaggregation, which feeds outcome comparison; the
//! driver runs the three per proposal and summarizes each organization.

pub mod aggregator;
pub mod compare;
pub mod driver;
pub mod reaggregate;
pub mod whales;

pub use aggregator::*;
pub use driver::{run_all, Driver, OrganizationJob};
pub use whales::DEFAULT_WHALE_QUANTILE;
