//! Shared tracing setup for the pingboard binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, init_with_level};
