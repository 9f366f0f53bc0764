//! Testing utilities for code that produces or consumes row streams.
//!
//! - **Scripted producers**: [`ScriptedProducer`] pushes, sleeps, fails,
//!   panics or waits for cancellation on cue, and counts its invocations.
//! - **Assertions**: [`assert_rows_in_order`], [`assert_fault_message`] and
//!   [`split_at_fault`] for checking what a consumer observed.
//!
//! # Quick Start
//!
//! ```
//! use rowstream::ChunkedSource;
//! use rowstream::testing::*;
//!
//! let script = ScriptedProducer::new().push(vec![1, 2]).fail("boom");
//! let source = ChunkedSource::new("flaky-api", script);
//!
//! let (rows, fault) = split_at_fault(source.iter());
//! assert_rows_in_order(&rows, &[1, 2]);
//! assert_fault_message(&fault.unwrap(), "boom");
//! ```

pub mod assertions;
pub mod scripted;

pub use assertions::*;
pub use scripted::*;
