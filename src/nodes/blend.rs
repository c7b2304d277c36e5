//! N-input aligned combiner.

use crate::align::{AlignedGroup, AlignerInput, AlignerPoll, StreamAligner, TsSyncMode};
use crate::error::Result;
use crate::frame::Frame;
use crate::link::Status;
use crate::node::{Node, StepContext, StepOutcome};
use crate::slice::SliceExecutor;
use crate::time::rescale;

/// Combines N aligned input streams into one output stream.
///
/// A [`StreamAligner`] hides the inputs' rate and end-of-stream differences;
/// for every aligned group the node emits one frame whose payload is the
/// byte-wise average of the present inputs, computed slice-parallel through
/// a [`SliceExecutor`]. The reference frame is mutated copy-on-write, so
/// holders elsewhere in the graph never observe the mix.
///
/// The mixing kernel itself is deliberately trivial; this node exists to
/// wire alignment, demand, and slice dispatch together the way any real
/// multi-input transform would.
pub struct Blend {
    aligner: StreamAligner,
    slice: SliceExecutor,
    n_inputs: usize,
    sequence: u64,
    name: String,
}

impl Blend {
    /// Combiner over the given aligner inputs.
    pub fn new(inputs: Vec<AlignerInput>, mode: TsSyncMode, slice: SliceExecutor) -> Result<Self> {
        let n_inputs = inputs.len();
        Ok(Self {
            aligner: StreamAligner::new(inputs, mode)?,
            slice,
            n_inputs,
            sequence: 0,
            name: "blend".to_string(),
        })
    }

    /// Set a custom name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The aligner's common time base; connect the output link with it (or
    /// any base it rescales to losslessly).
    pub fn time_base(&self) -> crate::time::TimeBase {
        self.aligner.time_base()
    }

    fn mix(&mut self, group: &AlignedGroup) -> Result<Option<Frame>> {
        let present: Vec<&Frame> = group.frames.iter().flatten().collect();
        let Some(&reference) = present.first() else {
            // Every contribution absent at this sync point; emit nothing.
            return Ok(None);
        };

        let mut out = (*reference).clone();
        if present.len() > 1 {
            let len = present
                .iter()
                .map(|f| f.payload().data.len())
                .min()
                .unwrap_or(0);
            if len > 0 {
                let others: Vec<&[u8]> = present[1..]
                    .iter()
                    .map(|f| f.payload().data.as_slice())
                    .collect();
                let count = present.len() as u32;
                let payload = out.make_writable();
                self.slice
                    .execute_over(&mut payload.data[..len], |job, chunk| {
                        for (offset, byte) in chunk.iter_mut().enumerate() {
                            let unit = job.range.start + offset;
                            let mut sum = *byte as u32;
                            for other in &others {
                                sum += other[unit] as u32;
                            }
                            *byte = (sum / count) as u8;
                        }
                        Ok(())
                    })?;
            }
        }

        out.set_pts(group.pts);
        let out = out.with_sequence(self.sequence);
        self.sequence += 1;
        Ok(Some(out))
    }
}

impl Node for Blend {
    fn input_ports(&self) -> usize {
        self.n_inputs
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn process(&mut self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        if ctx.output_is_terminal(0) {
            return Ok(StepOutcome::NotReady);
        }

        // Frames and statuses that already arrived are always processed;
        // new upstream requests are issued only under downstream demand.
        let request_upstream = ctx.output_wanted(0);
        match self.aligner.poll(ctx, request_upstream) {
            AlignerPoll::Group(group) => {
                let aligner_tb = self.aligner.time_base();
                if let Some(mut frame) = self.mix(&group)? {
                    frame.set_pts(rescale(group.pts, aligner_tb, ctx.output_time_base(0)));
                    ctx.push_frame(0, frame);
                }
                Ok(StepOutcome::Progressed)
            }
            // Under demand the aligner issued upstream requests for exactly
            // the inputs it is stalled on, and that is this step's
            // progress. Returning Progressed also keeps the generic demand
            // forwarding from re-requesting inputs the aligner already
            // holds lookaheads for.
            AlignerPoll::NotReady => Ok(StepOutcome::Progressed),
            AlignerPoll::Terminal(status) => {
                let aligner_tb = self.aligner.time_base();
                let translated = Status {
                    kind: status.kind,
                    pts: rescale(status.pts, aligner_tb, ctx.output_time_base(0)),
                };
                let mut progressed = ctx.set_output_status(0, translated);
                // The alignment is over; inputs still open (a Stop policy
                // can end it while others have data) must stop pulling.
                for port in 0..ctx.n_inputs() {
                    if ctx.input_is_terminal(port) {
                        continue;
                    }
                    let upstream = Status {
                        kind: status.kind,
                        pts: rescale(status.pts, aligner_tb, ctx.input_time_base(port)),
                    };
                    if ctx.close_input(port, upstream) {
                        progressed = true;
                    }
                }
                Ok(if progressed {
                    StepOutcome::Progressed
                } else {
                    StepOutcome::NotReady
                })
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
