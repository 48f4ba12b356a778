//! Structured logging for grove
//!
//! - `init(profile)` installs the process-wide subscriber once
//! - `log_op_start!`, `log_op_end!` and `log_op_error!` mark operation
//!   boundaries with the event names from `grove_core_types::schema`
//! - `test_capture` records events in memory for assertions
//!
//! ```rust
//! use grove_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Only the engine emits boundary events. The node store, tree cache and
//! content binder log internal detail at debug level.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
