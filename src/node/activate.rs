//! The reusable activation protocol.
//!
//! Every step function in the original body of node implementations repeats
//! the same three control-flow idioms around its actual transform. They are
//! implemented once here and wrapped around every [`Node::process`] call by
//! the scheduler:
//!
//! 1. **Backward status forward** — an already-terminal output means nobody
//!    downstream wants data; the same status is propagated to every input so
//!    upstream stops producing.
//! 2. **Forward status forward** — an input's terminal status, once its
//!    queue is drained and `process` declined to handle it, is acknowledged
//!    and propagated to the outputs.
//! 3. **Forward demand** — downstream demand that `process` could not
//!    satisfy from local data is forwarded upstream; issuing the request is
//!    itself progress.
//!
//! Nodes that manage statuses themselves (the aligner acknowledges its
//! inputs' statuses during polling) simply never leave a pending status for
//! idiom 2 to see.

use crate::error::Result;
use crate::node::{Node, StepContext, StepOutcome};

/// Run one step of `node` under the activation protocol.
pub fn activate(node: &mut dyn Node, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
    if forward_status_back(ctx) {
        return Ok(StepOutcome::Progressed);
    }

    match node.process(ctx)? {
        StepOutcome::Progressed => Ok(StepOutcome::Progressed),
        StepOutcome::NotReady => {
            if forward_status(ctx) {
                return Ok(StepOutcome::Progressed);
            }
            if forward_demand(ctx) {
                return Ok(StepOutcome::Progressed);
            }
            Ok(StepOutcome::NotReady)
        }
    }
}

/// Idiom 1: propagate a terminal output status back to every input.
fn forward_status_back(ctx: &mut StepContext<'_>) -> bool {
    let terminal = (0..ctx.n_outputs()).find_map(|o| ctx.output_status(o).map(|s| (o, s)));
    let Some((out, status)) = terminal else {
        return false;
    };

    let mut progressed = false;
    for input in 0..ctx.n_inputs() {
        if ctx.input_is_terminal(input) {
            continue;
        }
        let translated = ctx.status_for_input(status, out, input);
        if ctx.close_input(input, translated) {
            progressed = true;
        }
    }
    if progressed {
        tracing::debug!(node = ?ctx.node(), "terminal output propagated to inputs");
    }
    progressed
}

/// Idiom 2: acknowledge drained input statuses and forward them downstream.
fn forward_status(ctx: &mut StepContext<'_>) -> bool {
    let mut progressed = false;
    for input in 0..ctx.n_inputs() {
        if ctx.input_queued(input) > 0 {
            continue;
        }
        let Some(status) = ctx.acknowledge_input_status(input) else {
            continue;
        };
        progressed = true;
        for out in 0..ctx.n_outputs() {
            let translated = ctx.status_for_output(status, input, out);
            ctx.set_output_status(out, translated);
        }
    }
    progressed
}

/// Idiom 3: forward unsatisfied downstream demand to the inputs.
fn forward_demand(ctx: &mut StepContext<'_>) -> bool {
    let wanted = (0..ctx.n_outputs()).any(|o| ctx.output_wanted(o));
    if !wanted {
        return false;
    }

    let mut progressed = false;
    for input in 0..ctx.n_inputs() {
        if ctx.input_is_terminal(input) {
            continue;
        }
        if ctx.want_frame(input) {
            progressed = true;
        }
    }
    progressed
}
