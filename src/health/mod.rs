//! Health status aggregation for the status dashboard.
//!
//! Raw probe records go in; per-endpoint status, uptime and timelines come out.

mod aggregator;
mod locale;
mod range;
mod service;

pub use aggregator::*;
pub use locale::*;
pub use range::*;
pub use service::*;
