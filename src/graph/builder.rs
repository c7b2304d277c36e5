//! Graph construction.
//!
//! Port arity is a builder-time decision: nodes declare their port counts,
//! `connect` binds one producer port to one consumer port, and `build`
//! refuses a graph with unbound or doubly-bound ports. Once built, the
//! topology never changes.

use crate::error::{Error, Result};
use crate::graph::scheduler::Scheduler;
use crate::graph::{LinkId, NodeId};
use crate::link::LinkState;
use crate::node::Node;
use crate::time::TimeBase;
use smallvec::{smallvec, SmallVec};
use std::collections::HashMap;

struct PendingNode {
    node: Box<dyn Node>,
    name: String,
    inputs: SmallVec<[Option<LinkId>; 4]>,
    outputs: SmallVec<[Option<LinkId>; 4]>,
}

/// Builds a graph of nodes and links, then hands it to the scheduler.
///
/// # Example
///
/// ```rust,ignore
/// let mut builder = GraphBuilder::new();
/// let src = builder.add_node(FrameSource::from_pts([0, 10, 20]));
/// let sink = builder.add_node(CollectSink::new());
/// builder.connect(src, 0, sink, 0)?;
/// let mut scheduler = builder.build()?;
/// scheduler.run_until_idle()?;
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<PendingNode>,
    links: Vec<LinkState>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; its port counts are read from the trait.
    pub fn add_node(&mut self, node: impl Node + 'static) -> NodeId {
        let name = node.name().to_string();
        let inputs = smallvec![None; node.input_ports()];
        let outputs = smallvec![None; node.output_ports()];
        let id = NodeId(self.nodes.len());
        self.nodes.push(PendingNode {
            node: Box::new(node),
            name,
            inputs,
            outputs,
        });
        id
    }

    /// Connect an output port to an input port with the default time base.
    pub fn connect(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
    ) -> Result<LinkId> {
        self.connect_with_time_base(src, src_port, dst, dst_port, TimeBase::default())
    }

    /// Connect an output port to an input port, declaring the link's base.
    pub fn connect_with_time_base(
        &mut self,
        src: NodeId,
        src_port: usize,
        dst: NodeId,
        dst_port: usize,
        time_base: TimeBase,
    ) -> Result<LinkId> {
        let out_slot = self
            .nodes
            .get(src.0)
            .ok_or_else(|| Error::Graph(format!("{src} does not exist")))?
            .outputs
            .get(src_port)
            .ok_or_else(|| Error::Graph(format!("{src} has no output port {src_port}")))?;
        if out_slot.is_some() {
            return Err(Error::Graph(format!(
                "{src} output port {src_port} already connected"
            )));
        }
        let in_slot = self
            .nodes
            .get(dst.0)
            .ok_or_else(|| Error::Graph(format!("{dst} does not exist")))?
            .inputs
            .get(dst_port)
            .ok_or_else(|| Error::Graph(format!("{dst} has no input port {dst_port}")))?;
        if in_slot.is_some() {
            return Err(Error::Graph(format!(
                "{dst} input port {dst_port} already connected"
            )));
        }

        let id = LinkId(self.links.len());
        self.links.push(LinkState::new(src, dst, time_base));
        self.nodes[src.0].outputs[src_port] = Some(id);
        self.nodes[dst.0].inputs[dst_port] = Some(id);
        Ok(id)
    }

    /// Validate the wiring and produce a [`Scheduler`].
    ///
    /// Every declared port must be bound to exactly one link.
    pub fn build(self) -> Result<Scheduler> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, pending) in self.nodes.into_iter().enumerate() {
            let id = NodeId(idx);
            let inputs = bind_ports(id, &pending.name, pending.inputs, "input")?;
            let outputs = bind_ports(id, &pending.name, pending.outputs, "output")?;
            nodes.push((pending.node, pending.name, inputs, outputs));
        }
        Ok(Scheduler::from_parts(nodes, self.links))
    }

    /// Diagnostic map of node names, for tests and tooling.
    pub fn node_names(&self) -> HashMap<NodeId, String> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, n)| (NodeId(idx), n.name.clone()))
            .collect()
    }
}

fn bind_ports(
    id: NodeId,
    name: &str,
    ports: SmallVec<[Option<LinkId>; 4]>,
    direction: &str,
) -> Result<SmallVec<[LinkId; 4]>> {
    ports
        .into_iter()
        .enumerate()
        .map(|(port, link)| {
            link.ok_or_else(|| {
                Error::Graph(format!("{id} ({name}) {direction} port {port} is unbound"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{StepContext, StepOutcome};

    struct Stub {
        inputs: usize,
        outputs: usize,
    }

    impl Node for Stub {
        fn input_ports(&self) -> usize {
            self.inputs
        }
        fn output_ports(&self) -> usize {
            self.outputs
        }
        fn process(&mut self, _ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
            Ok(StepOutcome::NotReady)
        }
        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn test_connect_validates_ports() {
        let mut b = GraphBuilder::new();
        let a = b.add_node(Stub {
            inputs: 0,
            outputs: 1,
        });
        let c = b.add_node(Stub {
            inputs: 1,
            outputs: 0,
        });

        assert!(b.connect(a, 1, c, 0).is_err()); // no such output port
        assert!(b.connect(a, 0, c, 1).is_err()); // no such input port
        assert!(b.connect(a, 0, c, 0).is_ok());
        assert!(b.connect(a, 0, c, 0).is_err()); // double bind
    }

    #[test]
    fn test_build_rejects_unbound_port() {
        let mut b = GraphBuilder::new();
        b.add_node(Stub {
            inputs: 0,
            outputs: 1,
        });
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("unbound"));
    }

    #[test]
    fn test_build_accepts_fully_wired_graph() {
        let mut b = GraphBuilder::new();
        let a = b.add_node(Stub {
            inputs: 0,
            outputs: 1,
        });
        let c = b.add_node(Stub {
            inputs: 1,
            outputs: 0,
        });
        b.connect(a, 0, c, 0).unwrap();
        let scheduler = b.build().unwrap();
        assert_eq!(scheduler.node_count(), 2);
    }
}
