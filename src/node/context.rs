//! Step context: a node's window onto its own links.
//!
//! The scheduler builds a [`StepContext`] for each step invocation. It
//! exposes exactly the node's own input and output links, addressed by port
//! index, and applies the readiness side effects (waking the peer node) that
//! each link operation implies. This keeps nodes single-writer: a step can
//! only touch state it owns.

use crate::frame::Frame;
use crate::graph::scheduler::{ReadySet, PRIO_FRAME, PRIO_STATUS, PRIO_WANT};
use crate::graph::{LinkId, NodeId};
use crate::link::{Consumed, LinkState, Status};
use crate::time::{rescale, TimeBase};

/// A node's access to its links during one step invocation.
///
/// Port indices are validated: addressing a port the node does not have is
/// a programming error and panics.
pub struct StepContext<'a> {
    node: NodeId,
    links: &'a mut [LinkState],
    inputs: &'a [LinkId],
    outputs: &'a [LinkId],
    ready: &'a mut ReadySet,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        node: NodeId,
        links: &'a mut [LinkState],
        inputs: &'a [LinkId],
        outputs: &'a [LinkId],
        ready: &'a mut ReadySet,
    ) -> Self {
        Self {
            node,
            links,
            inputs,
            outputs,
            ready,
        }
    }

    /// The node this context belongs to.
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Number of input ports.
    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports.
    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    fn input(&self, port: usize) -> &LinkState {
        &self.links[self.inputs[port].0]
    }

    fn input_mut(&mut self, port: usize) -> &mut LinkState {
        &mut self.links[self.inputs[port].0]
    }

    fn output(&self, port: usize) -> &LinkState {
        &self.links[self.outputs[port].0]
    }

    fn output_mut(&mut self, port: usize) -> &mut LinkState {
        &mut self.links[self.outputs[port].0]
    }

    // ------------------------------------------------------------------
    // Input side
    // ------------------------------------------------------------------

    /// Pop one frame from an input, if any is queued.
    ///
    /// Terminal statuses are not reported here; see
    /// [`acknowledge_input_status`](Self::acknowledge_input_status).
    /// Consuming while more frames remain queued re-marks this node ready,
    /// so the remainder is processed on later steps without busy-spinning.
    pub fn consume_frame(&mut self, port: usize) -> Option<Frame> {
        let node = self.node;
        let link = self.input_mut(port);
        match link.try_consume(1, 1) {
            Consumed::Frames(mut frames) => {
                let frame = frames.pop();
                if link.queued() > 0 {
                    self.ready.mark(node, PRIO_FRAME);
                } else if link.pending_status().is_some() {
                    // The drain exposed a pending status; come back for it.
                    self.ready.mark(node, PRIO_STATUS);
                }
                frame
            }
            Consumed::None | Consumed::Terminal(_) => None,
        }
    }

    /// Pop at least `min`, at most `max` frames from an input.
    ///
    /// The full consume surface: `Consumed::None` when not enough frames are
    /// queued, the terminal status when the link will never carry more.
    pub fn try_consume(&mut self, port: usize, min: usize, max: usize) -> Consumed {
        let node = self.node;
        let link = self.input_mut(port);
        let consumed = link.try_consume(min, max);
        if matches!(consumed, Consumed::Frames(_)) {
            if link.queued() > 0 {
                self.ready.mark(node, PRIO_FRAME);
            } else if link.pending_status().is_some() {
                self.ready.mark(node, PRIO_STATUS);
            }
        }
        consumed
    }

    /// Non-destructive lookahead into an input's queue.
    pub fn peek_frame(&self, port: usize, index: usize) -> Option<&Frame> {
        self.input(port).peek(index)
    }

    /// Number of frames queued on an input.
    pub fn input_queued(&self, port: usize) -> usize {
        self.input(port).queued()
    }

    /// Deliver an input's pending status, exactly once.
    pub fn acknowledge_input_status(&mut self, port: usize) -> Option<Status> {
        self.input_mut(port).acknowledge_status()
    }

    /// An input's status slot (pending or already acknowledged).
    pub fn input_status(&self, port: usize) -> Option<Status> {
        self.input(port).status()
    }

    /// Whether an input has a terminal status set.
    pub fn input_is_terminal(&self, port: usize) -> bool {
        self.input(port).is_terminal()
    }

    /// Signal demand for a frame on an input.
    ///
    /// Wakes the upstream producer if the demand flag transitioned. Returns
    /// `true` in that case — a newly issued request counts as progress.
    pub fn want_frame(&mut self, port: usize) -> bool {
        let link = self.input_mut(port);
        let src = link.src();
        if link.want_frame() {
            self.ready.mark(src, PRIO_WANT);
            true
        } else {
            false
        }
    }

    /// Set a terminal status on an input, from the consumer side.
    ///
    /// This is the "stop sending" signal a sink uses when it will not accept
    /// more data; queued frames are discarded and the producer observes the
    /// terminal link and stops.
    pub fn close_input(&mut self, port: usize, status: Status) -> bool {
        let link = self.input_mut(port);
        let src = link.src();
        if link.close(status) {
            self.ready.mark(src, PRIO_STATUS);
            true
        } else {
            false
        }
    }

    /// Declared time base of an input link.
    pub fn input_time_base(&self, port: usize) -> TimeBase {
        self.input(port).time_base()
    }

    // ------------------------------------------------------------------
    // Output side
    // ------------------------------------------------------------------

    /// Append a frame to an output link and wake the consumer.
    ///
    /// A push onto a terminal output is quietly dropped (the status
    /// supersedes data); this is not an error.
    pub fn push_frame(&mut self, port: usize, frame: Frame) {
        let link = self.output_mut(port);
        let dst = link.dst();
        if link.push(frame) {
            self.ready.mark(dst, PRIO_FRAME);
        }
    }

    /// Set a terminal status on an output link and wake the consumer.
    pub fn set_output_status(&mut self, port: usize, status: Status) -> bool {
        let link = self.output_mut(port);
        let dst = link.dst();
        if link.set_status(status) {
            self.ready.mark(dst, PRIO_STATUS);
            true
        } else {
            false
        }
    }

    /// An output's status slot.
    pub fn output_status(&self, port: usize) -> Option<Status> {
        self.output(port).status()
    }

    /// Whether an output has a terminal status set.
    pub fn output_is_terminal(&self, port: usize) -> bool {
        self.output(port).is_terminal()
    }

    /// Whether downstream has signalled unsatisfied demand on an output.
    pub fn output_wanted(&self, port: usize) -> bool {
        self.output(port).frames_wanted()
    }

    /// Declared time base of an output link.
    pub fn output_time_base(&self, port: usize) -> TimeBase {
        self.output(port).time_base()
    }

    /// Timestamp of the most recent frame pushed on an output.
    pub fn output_last_pts(&self, port: usize) -> Option<i64> {
        self.output(port).last_pts()
    }

    /// Rescale a status from an output link's base into an input link's.
    pub(crate) fn status_for_input(&self, status: Status, out: usize, input: usize) -> Status {
        Status {
            kind: status.kind,
            pts: rescale(
                status.pts,
                self.output(out).time_base(),
                self.input(input).time_base(),
            ),
        }
    }

    /// Rescale a status from an input link's base into an output link's.
    pub(crate) fn status_for_output(&self, status: Status, input: usize, out: usize) -> Status {
        Status {
            kind: status.kind,
            pts: rescale(
                status.pts,
                self.input(input).time_base(),
                self.output(out).time_base(),
            ),
        }
    }
}
