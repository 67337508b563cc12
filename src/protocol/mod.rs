//! Wire protocol for the node: message types, JSON codec and topic rules
//!
//! This module defines what goes over the broker; the transport layer
//! decides how it gets there.

pub mod codec;
pub mod messages;
pub mod topics;

pub use codec::*;
pub use messages::*;
pub use topics::*;
