//! Built-in nodes.
//!
//! The minimal node library: a schedule-driven source, an identity filter,
//! an aligner-driven combiner, and a collecting sink. Together they exercise
//! every contract in the core — cooperative activation, demand-driven
//! backpressure, multi-input alignment, and slice-parallel dispatch —
//! and serve as the reference implementations for writing new nodes.

mod blend;
mod collect;
mod passthrough;
mod testsrc;

pub use blend::Blend;
pub use collect::{CollectHandle, CollectSink};
pub use passthrough::Passthrough;
pub use testsrc::FrameSource;
