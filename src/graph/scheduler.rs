//! The cooperative scheduler.
//!
//! Single-threaded with respect to node execution: at most one node's step
//! runs at a time. The scheduler keeps a readiness priority per node, picks
//! the highest-priority ready node, clears its flag, and invokes one step
//! through the activation protocol. A node that returns `NotReady` stays
//! parked until a new link push, status change, or demand signal re-marks it
//! — there is no polling and no busy-spin.
//!
//! External completions (hardware callbacks, timer expiry) re-arm a node
//! through a [`WakeHandle`]: a cloneable, thread-safe sender into the
//! scheduler's wake channel, drained at the top of every pick. This is the
//! level-triggered event object the design calls for; there is no global
//! mutable scheduling state.

use crate::error::{Error, Result};
use crate::graph::{LinkId, NodeId};
use crate::link::{LinkState, LinkStats, Status};
use crate::node::{activate, Node, StepContext};
use smallvec::SmallVec;

/// Readiness priority: a frame arrived on an input.
pub(crate) const PRIO_FRAME: u16 = 300;
/// Readiness priority: a status changed on an attached link.
pub(crate) const PRIO_STATUS: u16 = 200;
/// Readiness priority: an external wake handle fired.
pub(crate) const PRIO_WAKE: u16 = 150;
/// Readiness priority: downstream signalled demand.
pub(crate) const PRIO_WANT: u16 = 100;

/// Per-node readiness priorities. Zero means idle.
#[derive(Debug)]
pub(crate) struct ReadySet {
    prio: Vec<u16>,
}

impl ReadySet {
    pub(crate) fn new(nodes: usize) -> Self {
        Self {
            prio: vec![0; nodes],
        }
    }

    /// Raise a node's readiness to at least `prio`.
    pub(crate) fn mark(&mut self, node: NodeId, prio: u16) {
        let slot = &mut self.prio[node.0];
        *slot = (*slot).max(prio);
    }

    /// Clear a node's readiness.
    pub(crate) fn clear(&mut self, node: NodeId) {
        self.prio[node.0] = 0;
    }

    /// Pick and clear the highest-priority ready node.
    pub(crate) fn take_best(&mut self) -> Option<NodeId> {
        // Ties break toward the lowest node id, so picks are deterministic.
        let (idx, &best) = self
            .prio
            .iter()
            .enumerate()
            .max_by_key(|&(i, &p)| (p, std::cmp::Reverse(i)))?;
        if best == 0 {
            return None;
        }
        self.prio[idx] = 0;
        Some(NodeId(idx))
    }

    pub(crate) fn is_ready(&self, node: NodeId) -> bool {
        self.prio[node.0] > 0
    }
}

/// Outcome of driving the scheduler until it has nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every link carries a terminal status: the graph has drained.
    Finished,
    /// No node is ready but the graph is not terminal; it is waiting for
    /// external events (wake handles, or demand the host has not signalled).
    Idle,
}

/// Re-arms a node from outside the scheduler.
///
/// Cloneable and `Send`; typically handed to a completion callback. Waking
/// is level-triggered: the node is marked ready and stepped once, and stays
/// idle afterwards unless new events occur.
#[derive(Clone)]
pub struct WakeHandle {
    node: NodeId,
    tx: kanal::Sender<NodeId>,
}

impl WakeHandle {
    /// Mark the node ready. Never blocks.
    pub fn wake(&self) {
        // The receiver lives as long as the scheduler; a send failure just
        // means the graph is gone.
        let _ = self.tx.send(self.node);
    }
}

struct NodeSlot {
    node: Option<Box<dyn Node>>,
    name: String,
    inputs: SmallVec<[LinkId; 4]>,
    outputs: SmallVec<[LinkId; 4]>,
    alive: bool,
}

/// Owns the graph and drives it cooperatively.
pub struct Scheduler {
    nodes: Vec<NodeSlot>,
    links: Vec<LinkState>,
    ready: ReadySet,
    wake_tx: kanal::Sender<NodeId>,
    wake_rx: kanal::Receiver<NodeId>,
    handles_issued: bool,
    first_error: Option<Error>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("nodes", &self.nodes.len())
            .field("links", &self.links.len())
            .field("handles_issued", &self.handles_issued)
            .field("first_error", &self.first_error)
            .finish()
    }
}

impl Scheduler {
    pub(crate) fn from_parts(
        nodes: Vec<(Box<dyn Node>, String, SmallVec<[LinkId; 4]>, SmallVec<[LinkId; 4]>)>,
        links: Vec<LinkState>,
    ) -> Self {
        let mut ready = ReadySet::new(nodes.len());
        // Bootstrap: every node gets one low-priority step so sinks can
        // signal initial demand and sources can observe it.
        for idx in 0..nodes.len() {
            ready.mark(NodeId(idx), PRIO_WANT);
        }
        let (wake_tx, wake_rx) = kanal::unbounded();
        Self {
            nodes: nodes
                .into_iter()
                .map(|(node, name, inputs, outputs)| NodeSlot {
                    node: Some(node),
                    name,
                    inputs,
                    outputs,
                    alive: true,
                })
                .collect(),
            links,
            ready,
            wake_tx,
            wake_rx,
            handles_issued: false,
            first_error: None,
        }
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A node's diagnostic name.
    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    /// Whether a node is currently marked ready.
    pub fn is_ready(&self, node: NodeId) -> bool {
        self.ready.is_ready(node)
    }

    /// Occupancy statistics for a link.
    pub fn link_stats(&self, link: LinkId) -> LinkStats {
        self.links[link.0].stats()
    }

    /// The status slot of a link, if set.
    pub fn link_status(&self, link: LinkId) -> Option<Status> {
        self.links[link.0].status()
    }

    /// An external re-arming handle for a node.
    pub fn wake_handle(&mut self, node: NodeId) -> WakeHandle {
        self.handles_issued = true;
        WakeHandle {
            node,
            tx: self.wake_tx.clone(),
        }
    }

    /// Whether every link carries a terminal status.
    pub fn is_finished(&self) -> bool {
        self.links.iter().all(|l| l.is_terminal())
    }

    fn drain_wakes(&mut self) {
        while let Ok(Some(node)) = self.wake_rx.try_recv() {
            if self.nodes.get(node.0).is_some_and(|slot| slot.alive) {
                self.ready.mark(node, PRIO_WAKE);
            }
        }
    }

    /// Pick one ready node and run one step.
    ///
    /// Returns `Ok(false)` when no node is ready. A fatal step error tears
    /// the node down (error status on all attached links) and is returned.
    pub fn step_once(&mut self) -> Result<bool> {
        self.drain_wakes();
        loop {
            let Some(id) = self.ready.take_best() else {
                return Ok(false);
            };
            let slot = &mut self.nodes[id.0];
            if !slot.alive {
                continue;
            }

            let mut node = slot
                .node
                .take()
                .ok_or_else(|| Error::Graph(format!("{id} stepped reentrantly")))?;
            let inputs = slot.inputs.clone();
            let outputs = slot.outputs.clone();

            let outcome = {
                let mut ctx =
                    StepContext::new(id, &mut self.links, &inputs, &outputs, &mut self.ready);
                activate(node.as_mut(), &mut ctx)
            };

            self.nodes[id.0].node = Some(node);
            return match outcome {
                Ok(outcome) => {
                    tracing::trace!(node = %id, name = %self.nodes[id.0].name, ?outcome, "step");
                    Ok(true)
                }
                Err(err) => {
                    self.teardown(id, &err);
                    Err(err)
                }
            };
        }
    }

    /// Drive the graph until no node is ready.
    ///
    /// Fatal errors tear down the failing node, let the statuses propagate
    /// through the rest of the graph region, and the first error is returned
    /// once the graph quiesces.
    pub fn run_until_idle(&mut self) -> Result<RunOutcome> {
        loop {
            match self.step_once() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(err) => {
                    if self.first_error.is_none() {
                        self.first_error = Some(err);
                    }
                }
            }
        }
        if let Some(err) = self.first_error.take() {
            return Err(err);
        }
        Ok(if self.is_finished() {
            RunOutcome::Finished
        } else {
            RunOutcome::Idle
        })
    }

    /// Drive the graph to completion, blocking on external wakes.
    ///
    /// Like [`run_until_idle`](Self::run_until_idle), but when the graph
    /// stalls and wake handles have been issued, blocks until one fires.
    /// With no handles outstanding a stall cannot resolve itself, so `Idle`
    /// is returned instead of deadlocking.
    pub fn run(&mut self) -> Result<RunOutcome> {
        loop {
            match self.run_until_idle()? {
                RunOutcome::Finished => return Ok(RunOutcome::Finished),
                RunOutcome::Idle => {
                    if !self.handles_issued {
                        return Ok(RunOutcome::Idle);
                    }
                    match self.wake_rx.recv() {
                        Ok(node) => {
                            if self.nodes.get(node.0).is_some_and(|slot| slot.alive) {
                                self.ready.mark(node, PRIO_WAKE);
                            }
                        }
                        Err(_) => return Ok(RunOutcome::Idle),
                    }
                }
            }
        }
    }

    /// Tear down a node after a fatal step error.
    ///
    /// Every attached link gets an error status at its last known
    /// timestamp, waking the peers so the failure propagates through the
    /// graph region; the node itself never runs again.
    fn teardown(&mut self, id: NodeId, err: &Error) {
        let code = err.code();
        tracing::error!(node = %id, name = %self.nodes[id.0].name, error = %err, "node torn down");
        let slot = &mut self.nodes[id.0];
        slot.alive = false;
        slot.node = None;
        let inputs: Vec<LinkId> = slot.inputs.to_vec();
        let outputs: Vec<LinkId> = slot.outputs.to_vec();
        // Nobody will consume the dead node's inputs: close them, discarding
        // queued frames. Its outputs keep their queues so downstream can
        // drain what was already produced before seeing the error.
        for link_id in inputs {
            let link = &mut self.links[link_id.0];
            let pts = link.last_pts().unwrap_or(0);
            let src = link.src();
            if link.close(Status::failed(code, pts)) {
                self.ready.mark(src, PRIO_STATUS);
            }
        }
        for link_id in outputs {
            let link = &mut self.links[link_id.0];
            let pts = link.last_pts().unwrap_or(0);
            let dst = link.dst();
            if link.set_status(Status::failed(code, pts)) {
                self.ready.mark(dst, PRIO_STATUS);
            }
        }
        self.ready.clear(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_set_picks_highest_priority() {
        let mut ready = ReadySet::new(3);
        ready.mark(NodeId(0), PRIO_WANT);
        ready.mark(NodeId(2), PRIO_FRAME);
        ready.mark(NodeId(1), PRIO_STATUS);

        assert_eq!(ready.take_best(), Some(NodeId(2)));
        assert_eq!(ready.take_best(), Some(NodeId(1)));
        assert_eq!(ready.take_best(), Some(NodeId(0)));
        assert_eq!(ready.take_best(), None);
    }

    #[test]
    fn test_ready_set_mark_keeps_max() {
        let mut ready = ReadySet::new(1);
        ready.mark(NodeId(0), PRIO_FRAME);
        ready.mark(NodeId(0), PRIO_WANT);
        assert!(ready.is_ready(NodeId(0)));
        assert_eq!(ready.take_best(), Some(NodeId(0)));
        assert!(!ready.is_ready(NodeId(0)));
    }
}
