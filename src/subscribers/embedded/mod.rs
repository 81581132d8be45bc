//! # Built-in subscribers
//!
//! - [`LogWriter`]: renders events through `tracing` (warnings for failures).

mod log;

pub use log::LogWriter;
