//! Multi-input temporal alignment.
//!
//! A [`StreamAligner`] sits inside any node with more than one input. It
//! buffers one lookahead frame per input, computes sync points as the
//! minimum lookahead timestamp across the inputs, and hands the node's
//! processing step groups of mutually-aligned current frames — hiding
//! per-input differences in rate and in end-of-stream timing.
//!
//! Each input declares a time base, a sync level (how mandatory the input
//! is for emitting a group), and extension policies for both ends of the
//! stream: what the input contributes before its first frame and what
//! happens once it is exhausted. Timestamps are rescaled into the coarsest
//! base that exactly represents every input, so cross-input comparison
//! never rounds.
//!
//! Successive emitted groups are non-decreasing in timestamp, and replaying
//! the same per-input arrival sequence always yields the same groups and
//! the same terminal status.

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::link::{Status, StatusKind};
use crate::node::StepContext;
use crate::time::{rescale, TimeBase};
use smallvec::SmallVec;

/// Stream extension policy, for either end of an input.
///
/// Before the first frame: `Null` contributes nothing, `Infinity` treats
/// the first frame as already present from the start, `Stop` terminates the
/// alignment if a sync point precedes the input's first frame.
///
/// After the last frame: `Stop` terminates the whole alignment immediately,
/// `Null` makes the input contribute nothing from then on, `Infinity` holds
/// the last frame forward indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extension {
    /// Terminate the alignment.
    Stop,
    /// Contribute nothing.
    #[default]
    Null,
    /// Extend the nearest frame indefinitely.
    Infinity,
}

/// How lookahead timestamps are matched against the sync target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TsSyncMode {
    /// Promote a lookahead when its timestamp equals the sync target.
    #[default]
    Default,
    /// Additionally promote, for inputs below the aligner's overall sync
    /// level, a lookahead strictly nearer to the target than the input's
    /// current frame.
    Nearest,
}

/// Configuration for one aligner input.
#[derive(Debug, Clone, Copy)]
pub struct AlignerInput {
    /// Time base of timestamps arriving on this input.
    pub time_base: TimeBase,
    /// Sync priority: 0 = excluded, 2 is conventionally the primary input,
    /// 1 a secondary. Only drops over the aligner's lifetime.
    pub sync_level: u32,
    /// Policy before the input's first frame.
    pub before: Extension,
    /// Policy after the input's last frame.
    pub after: Extension,
}

impl AlignerInput {
    /// A mandatory input with the given base and sensible defaults.
    pub fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            sync_level: 1,
            before: Extension::Null,
            after: Extension::Null,
        }
    }

    /// Set the sync level.
    pub fn with_sync_level(mut self, sync_level: u32) -> Self {
        self.sync_level = sync_level;
        self
    }

    /// Set the before-first-frame policy.
    pub fn with_before(mut self, before: Extension) -> Self {
        self.before = before;
        self
    }

    /// Set the after-last-frame policy.
    pub fn with_after(mut self, after: Extension) -> Self {
        self.after = after;
        self
    }
}

/// One group of mutually-aligned frames, one entry per input.
///
/// `None` marks an absent contribution: an excluded input, an input that
/// has not produced its first frame yet, or one exhausted under the `Null`
/// policy.
#[derive(Debug, Clone)]
pub struct AlignedGroup {
    /// The group's timestamp, in the aligner's common time base.
    pub pts: i64,
    /// Current frame per input, in input order.
    pub frames: Vec<Option<Frame>>,
}

/// Result of one aligner poll.
#[derive(Debug)]
pub enum AlignerPoll {
    /// A synchronized group is ready.
    Group(AlignedGroup),
    /// Some required input has neither a lookahead nor a status yet;
    /// upstream requests were issued for exactly those inputs.
    NotReady,
    /// The alignment has terminated; sticky across further polls.
    Terminal(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Before the first frame.
    Bof,
    /// Producing frames.
    Run,
    /// Exhausted.
    Eof,
}

#[derive(Debug)]
struct InputState {
    cfg: AlignerInput,
    sync: u32,
    lifecycle: Lifecycle,
    frame: Option<Frame>,
    next: Option<Frame>,
    pts: i64,
    pts_next: i64,
}

impl InputState {
    fn have_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Aligns N input streams by timestamp.
#[derive(Debug)]
pub struct StreamAligner {
    inputs: Vec<InputState>,
    time_base: TimeBase,
    mode: TsSyncMode,
    sync_level: u32,
    pts: i64,
    terminal: Option<Status>,
}

impl StreamAligner {
    /// Create an aligner over the given inputs.
    ///
    /// At least one input must have a positive sync level. Inputs
    /// configured with sync level 0 are excluded: never pulled, never
    /// waited for, always `None` in emitted groups.
    pub fn new(inputs: Vec<AlignerInput>, mode: TsSyncMode) -> Result<Self> {
        if inputs.is_empty() {
            return Err(Error::InvalidData("aligner needs at least one input".into()));
        }
        let sync_level = inputs.iter().map(|i| i.sync_level).max().unwrap_or(0);
        if sync_level == 0 {
            return Err(Error::InvalidData(
                "aligner needs at least one input with a positive sync level".into(),
            ));
        }
        let time_base = inputs
            .iter()
            .filter(|i| i.sync_level > 0)
            .map(|i| i.time_base)
            .reduce(TimeBase::common)
            .unwrap_or_default();

        let inputs = inputs
            .into_iter()
            .map(|cfg| InputState {
                sync: cfg.sync_level,
                lifecycle: if cfg.sync_level == 0 {
                    Lifecycle::Eof
                } else {
                    Lifecycle::Bof
                },
                cfg,
                frame: None,
                next: None,
                pts: i64::MIN,
                pts_next: i64::MIN,
            })
            .collect();

        Ok(Self {
            inputs,
            time_base,
            mode,
            sync_level,
            pts: i64::MIN,
            terminal: None,
        })
    }

    /// Number of inputs.
    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// The aligner's common time base; emitted group timestamps use it.
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Current overall sync level (max over still-active inputs).
    pub fn sync_level(&self) -> u32 {
        self.sync_level
    }

    /// The terminal status, once the alignment has ended.
    pub fn terminal(&self) -> Option<Status> {
        self.terminal
    }

    /// Advance the alignment by at most one group.
    ///
    /// Pulls lookaheads from the node's input ports (which must correspond
    /// one-to-one, in order, with the aligner's inputs) and acknowledges
    /// input statuses. When the alignment stalls, upstream requests are
    /// issued for exactly the stalled inputs — but only with
    /// `request_upstream` set, which callers derive from downstream demand
    /// so the aligner never pulls speculatively.
    pub fn poll(&mut self, ctx: &mut StepContext<'_>, request_upstream: bool) -> AlignerPoll {
        if let Some(status) = self.terminal {
            return AlignerPoll::Terminal(status);
        }

        loop {
            // Fill lookaheads; a sync point cannot be chosen until every
            // active input has either a lookahead or a terminal status.
            let mut stalled: SmallVec<[usize; 4]> = SmallVec::new();
            for i in 0..self.inputs.len() {
                if self.inputs[i].lifecycle == Lifecycle::Eof || self.inputs[i].have_next() {
                    continue;
                }
                if let Some(frame) = ctx.consume_frame(i) {
                    let st = &mut self.inputs[i];
                    st.pts_next = rescale(frame.pts(), st.cfg.time_base, self.time_base);
                    st.next = Some(frame);
                } else if let Some(status) = ctx.acknowledge_input_status(i) {
                    self.input_eof(i, status);
                    if let Some(status) = self.terminal {
                        return AlignerPoll::Terminal(status);
                    }
                } else {
                    stalled.push(i);
                }
            }
            if !stalled.is_empty() {
                if request_upstream {
                    for i in stalled {
                        ctx.want_frame(i);
                    }
                }
                return AlignerPoll::NotReady;
            }

            // The sync target is the minimum lookahead timestamp.
            let Some(target) = self
                .inputs
                .iter()
                .filter(|st| st.have_next())
                .map(|st| st.pts_next)
                .min()
            else {
                // Every input exhausted.
                return AlignerPoll::Terminal(self.terminate(Status::eof(self.pts.max(0))));
            };
            if target < self.pts {
                tracing::warn!(
                    target,
                    current = self.pts,
                    "non-monotonic input timestamps at sync point"
                );
            }

            // Promote lookaheads that land on the target.
            for st in &mut self.inputs {
                if !st.have_next() {
                    continue;
                }
                let promote = st.pts_next == target
                    || (st.lifecycle == Lifecycle::Bof && st.cfg.before == Extension::Infinity)
                    || (self.mode == TsSyncMode::Nearest
                        && st.sync < self.sync_level
                        && st.lifecycle == Lifecycle::Run
                        && (st.pts_next - target).abs() < (st.pts - target).abs());
                if promote {
                    st.frame = st.next.take();
                    st.pts = st.pts_next;
                    st.lifecycle = Lifecycle::Run;
                }
            }

            // An input still before its first frame with a Stop policy ends
            // the whole alignment at this sync point.
            if self
                .inputs
                .iter()
                .any(|st| st.lifecycle == Lifecycle::Bof && st.cfg.before == Extension::Stop)
            {
                return AlignerPoll::Terminal(self.terminate(Status::eof(target)));
            }

            self.pts = target;

            // A group is ready once every input at or above the current
            // sync level holds a current frame.
            let ready = self
                .inputs
                .iter()
                .filter(|st| st.sync >= self.sync_level && st.sync > 0)
                .all(|st| st.frame.is_some());
            if ready {
                tracing::trace!(pts = target, "aligned group ready");
                return AlignerPoll::Group(AlignedGroup {
                    pts: target,
                    frames: self.inputs.iter().map(|st| st.frame.clone()).collect(),
                });
            }
        }
    }

    /// Handle an input's terminal status.
    fn input_eof(&mut self, index: usize, status: Status) {
        let common = self.time_base;
        let st = &mut self.inputs[index];
        let pts = rescale(status.pts, st.cfg.time_base, common);
        st.lifecycle = Lifecycle::Eof;
        st.next = None;
        st.sync = 0;

        tracing::debug!(input = index, pts, after = ?st.cfg.after, "aligner input ended");

        // Upstream fatal errors are forwarded verbatim, regardless of the
        // extension policy.
        if let StatusKind::Failed(code) = status.kind {
            self.terminate(Status::failed(code, pts.max(self.pts)));
            return;
        }

        match st.cfg.after {
            Extension::Stop => {
                self.terminate(Status::eof(pts.max(self.pts)));
                return;
            }
            Extension::Null => st.frame = None,
            Extension::Infinity => {} // hold the last frame
        }

        // The overall sync level only ever drops. With no active input
        // left the alignment itself ends.
        let active_max = self
            .inputs
            .iter()
            .filter(|st| st.lifecycle != Lifecycle::Eof)
            .map(|st| st.sync)
            .max()
            .unwrap_or(0);
        if active_max == 0 {
            self.terminate(Status::eof(self.pts.max(pts)));
        } else {
            self.sync_level = self.sync_level.min(active_max);
        }
    }

    /// Record the terminal status (first one wins) and return the winner.
    fn terminate(&mut self, status: Status) -> Status {
        if let Some(existing) = self.terminal {
            return existing;
        }
        tracing::debug!(pts = status.pts, error = status.is_error(), "alignment terminated");
        self.terminal = Some(status);
        status
    }
}
