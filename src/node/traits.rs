//! Core node trait.

use crate::error::Result;
use crate::node::StepContext;

/// Outcome of one step invocation.
///
/// Fatal errors are not an outcome; they are `Err(...)` from the step and
/// tear the node down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Forward progress was made: a frame consumed or produced, a status
    /// propagated, or an upstream request issued.
    Progressed,
    /// No progress is possible right now. The node will not be stepped
    /// again until a new readiness event occurs — this is what prevents
    /// busy-spinning.
    NotReady,
}

/// A graph vertex implementing one data transformation.
///
/// Port arity is fixed at construction: the builder validates every
/// connection against `input_ports`/`output_ports` and refuses to build a
/// graph with unbound ports. A node is mutated only by its own step
/// invocation (single-writer); the scheduler runs at most one step at a
/// time.
///
/// # Step contract
///
/// `process` must attempt forward progress — consume available input,
/// produce output — and report honestly: returning
/// [`StepOutcome::NotReady`] when nothing was done is what lets the
/// scheduler park the node. The surrounding [`activate`](crate::node::activate)
/// protocol handles terminal statuses and demand forwarding, so most nodes
/// only ever touch frames.
///
/// A step must never block indefinitely. Work waiting on an external
/// completion returns `NotReady` and arranges a
/// [`WakeHandle`](crate::graph::WakeHandle) to re-arm the node.
pub trait Node: Send {
    /// Number of input ports.
    fn input_ports(&self) -> usize;

    /// Number of output ports.
    fn output_ports(&self) -> usize;

    /// Attempt one unit of forward progress.
    fn process(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome>;

    /// Name for logs and diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
