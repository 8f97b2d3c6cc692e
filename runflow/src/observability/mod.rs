//! Observability utilities.
//!
//! Logging goes through `tracing`; [`init_logging`] installs a subscriber
//! for binaries, and the span helpers tag coordinator work with run ids.

mod logging;
mod spans;

pub use logging::{build_filter, init_logging};
pub use spans::{run_span, stage_span};
