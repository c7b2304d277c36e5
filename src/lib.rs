//! # flowsync
//!
//! The cooperative scheduling and synchronization core of a streaming media
//! transformation graph: nodes connected by links, each link carrying a
//! sequence of timestamped frames.
//!
//! The hard part of such a graph is not any single transformation but the
//! machinery around it, and that machinery is what this crate provides:
//!
//! - **Links** ([`link`]): frame FIFOs with a sticky terminal status and
//!   demand signalling.
//! - **Activation** ([`node`]): the cooperative step contract every node
//!   obeys, with the three status/demand forwarding idioms implemented once
//!   instead of per node.
//! - **Scheduling** ([`graph`]): a single-threaded ready-set scheduler that
//!   never busy-spins, with level-triggered external re-arming.
//! - **Alignment** ([`align`]): timestamp synchronization of heterogeneous
//!   multi-input streams, tolerant of differing rates and stream lengths.
//! - **Slice dispatch** ([`slice`]): exact-partition fan-out of one step's
//!   data-parallel work across worker threads.
//!
//! ## Quick start
//!
//! ```rust
//! use flowsync::graph::GraphBuilder;
//! use flowsync::nodes::{CollectSink, FrameSource, Passthrough};
//!
//! # fn main() -> flowsync::Result<()> {
//! let mut builder = GraphBuilder::new();
//! let src = builder.add_node(FrameSource::from_pts([0, 10, 20]));
//! let filter = builder.add_node(Passthrough::new());
//! let sink = CollectSink::new();
//! let collected = sink.handle();
//! let sink = builder.add_node(sink);
//!
//! builder.connect(src, 0, filter, 0)?;
//! builder.connect(filter, 0, sink, 0)?;
//!
//! let mut scheduler = builder.build()?;
//! scheduler.run_until_idle()?;
//!
//! assert_eq!(collected.pts_list(), vec![0, 10, 20]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod align;
pub mod error;
pub mod frame;
pub mod graph;
pub mod link;
pub mod node;
pub mod nodes;
pub mod slice;
pub mod time;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::align::{AlignerInput, AlignerPoll, Extension, StreamAligner, TsSyncMode};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::frame::Frame;
    pub use crate::graph::{GraphBuilder, RunOutcome, Scheduler, WakeHandle};
    pub use crate::link::{Consumed, Status, StatusKind};
    pub use crate::node::{Node, StepContext, StepOutcome};
    pub use crate::slice::SliceExecutor;
    pub use crate::time::TimeBase;
}

pub use error::{Error, Result};
