//! Testing utilities and mock implementations
//!
//! Mocks for every collaborator the agent core drives, so whole agents can
//! be simulated in-process without a network, a broker or hardware.

pub mod mocks;

pub use mocks::*;
