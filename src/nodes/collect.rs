//! Collecting sink.

use crate::error::Result;
use crate::frame::Frame;
use crate::link::Status;
use crate::node::{Node, StepContext, StepOutcome};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Collected {
    frames: Vec<Frame>,
    status: Option<Status>,
}

/// Shared view of what a [`CollectSink`] has received.
#[derive(Debug, Clone, Default)]
pub struct CollectHandle {
    state: Arc<Mutex<Collected>>,
}

impl CollectHandle {
    /// Clones of every collected frame, in arrival order.
    pub fn frames(&self) -> Vec<Frame> {
        self.state.lock().expect("collector poisoned").frames.clone()
    }

    /// Timestamps of the collected frames, in arrival order.
    pub fn pts_list(&self) -> Vec<i64> {
        self.state
            .lock()
            .expect("collector poisoned")
            .frames
            .iter()
            .map(Frame::pts)
            .collect()
    }

    /// Number of collected frames.
    pub fn frame_count(&self) -> usize {
        self.state.lock().expect("collector poisoned").frames.len()
    }

    /// The terminal status the sink observed, once it arrives.
    pub fn status(&self) -> Option<Status> {
        self.state.lock().expect("collector poisoned").status
    }
}

/// A sink that pulls frames continuously and records what it sees.
///
/// Drives demand: it requests a frame whenever it has nothing to consume,
/// which is what keeps a demand-driven pipeline flowing. With a frame limit
/// configured, the sink closes its input after the limit — the downstream
/// "stop sending" signal the backward-status idiom propagates upstream.
pub struct CollectSink {
    state: Arc<Mutex<Collected>>,
    limit: Option<usize>,
    name: String,
}

impl CollectSink {
    /// Sink without a frame limit.
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            limit: None,
            name: "collectsink".to_string(),
        }
    }

    /// Sink that closes its input after `limit` frames.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Handle for inspecting collected frames and status.
    pub fn handle(&self) -> CollectHandle {
        CollectHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for CollectSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for CollectSink {
    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        0
    }

    fn process(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let mut state = self.state.lock().expect("collector poisoned");

        if let Some(limit) = self.limit {
            if state.frames.len() >= limit && state.status.is_none() {
                let pts = state.frames.last().map(Frame::pts).unwrap_or(0);
                let status = Status::eof(pts);
                state.status = Some(status);
                drop(state);
                ctx.close_input(0, status);
                return Ok(StepOutcome::Progressed);
            }
        }

        if let Some(frame) = ctx.consume_frame(0) {
            state.frames.push(frame);
            drop(state);
            // Keep pulling.
            ctx.want_frame(0);
            return Ok(StepOutcome::Progressed);
        }

        if let Some(status) = ctx.acknowledge_input_status(0) {
            state.status = Some(status);
            return Ok(StepOutcome::Progressed);
        }
        drop(state);

        if ctx.want_frame(0) {
            Ok(StepOutcome::Progressed)
        } else {
            Ok(StepOutcome::NotReady)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
