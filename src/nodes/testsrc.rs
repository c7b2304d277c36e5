//! Schedule-driven test source.

use crate::error::Result;
use crate::frame::Frame;
use crate::link::Status;
use crate::node::{Node, StepContext, StepOutcome};
use std::collections::VecDeque;

/// A source that emits a fixed schedule of frames, then end-of-stream.
///
/// Frames are produced one per step and only on downstream demand, which is
/// the backpressure discipline every well-behaved source follows: never
/// push speculatively. Once the schedule is exhausted, the source posts
/// end-of-stream at the final frame's timestamp (plus its duration, when
/// declared).
pub struct FrameSource {
    schedule: VecDeque<Frame>,
    eof_pts: i64,
    sequence: u64,
    name: String,
}

impl FrameSource {
    /// Source over pre-built frames.
    pub fn new(frames: Vec<Frame>) -> Self {
        let eof_pts = frames
            .last()
            .map(|f| f.pts() + f.duration().unwrap_or(0))
            .unwrap_or(0);
        Self {
            schedule: frames.into(),
            eof_pts,
            sequence: 0,
            name: "framesource".to_string(),
        }
    }

    /// Source emitting one tiny frame per timestamp.
    pub fn from_pts(pts: impl IntoIterator<Item = i64>) -> Self {
        Self::new(
            pts.into_iter()
                .map(|pts| Frame::from_bytes(vec![pts as u8], pts))
                .collect(),
        )
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Node for FrameSource {
    fn input_ports(&self) -> usize {
        0
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn process(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        if ctx.output_is_terminal(0) {
            // Downstream stopped; nothing left to do.
            return Ok(StepOutcome::NotReady);
        }
        if !ctx.output_wanted(0) {
            return Ok(StepOutcome::NotReady);
        }
        match self.schedule.pop_front() {
            Some(frame) => {
                let frame = frame.with_sequence(self.sequence);
                self.sequence += 1;
                ctx.push_frame(0, frame);
                Ok(StepOutcome::Progressed)
            }
            None => {
                if ctx.set_output_status(0, Status::eof(self.eof_pts)) {
                    Ok(StepOutcome::Progressed)
                } else {
                    Ok(StepOutcome::NotReady)
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
