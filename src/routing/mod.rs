//! Command routing
//!
//! Maps inbound messages on bound topics to actuator writes. See
//! [`CommandRouter`] for the acceptance rules.

pub mod router;

pub use router::{BatchSummary, CommandRouter, RouteError};
