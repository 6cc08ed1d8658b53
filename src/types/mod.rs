//! Core types for the lockstep scheduler.
//!
//! This module contains the fundamental types used throughout the crate:
//!
//! - [`time`]: The simulated-time instant type ([`SimTime`])
//! - [`id`]: Group-cancellation keys ([`AssociateId`])

pub mod id;
pub mod time;

pub use id::AssociateId;
pub use time::SimTime;
