//! # livepilot telemetry
//!
//! Structured logging for livepilot hosts using `tracing`.
//!
//! ## Usage
//!
//! ```rust
//! use livepilot_telemetry::{info, init_telemetry};
//!
//! fn main() {
//!     init_telemetry("livepilot-host");
//!     info!(component = "startup", "ready");
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Instrument, Span, debug, error, info, instrument, trace, warn};

// Re-export span helpers
pub use spans::*;

// Re-export init functions
pub use init::{init_json_telemetry, init_telemetry};
