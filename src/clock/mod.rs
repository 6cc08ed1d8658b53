//! The virtual clock engine.
//!
//! - [`virtual_clock`]: the clock itself, its configuration, and the
//!   [`TimeSource`] seam shared with production code
//! - the internal priority queue lives in a private submodule

mod queue;
pub mod virtual_clock;

pub use virtual_clock::{
    ClockConfig, DEFAULT_POLL_GRANULARITY, DEFAULT_REAL_WAIT_CEILING, TimeSource, VirtualClock,
    WallClock,
};
