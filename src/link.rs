//! Links: frame FIFOs with a sticky terminal status.
//!
//! A link is the directed edge between a producer port and a consumer port.
//! It owns a FIFO of [`Frame`]s, one terminal [`Status`] slot, a demand flag
//! for downstream "frame wanted" signalling, and occupancy statistics.
//!
//! Scheduling side effects (marking the endpoints ready) are applied by the
//! [`StepContext`](crate::node::StepContext) wrappers; the methods here
//! return whether a state transition happened so callers know when to wake.

use crate::error::ErrorCode;
use crate::frame::Frame;
use crate::graph::NodeId;
use crate::time::TimeBase;
use std::collections::VecDeque;
use std::time::Instant;

/// Kind of terminal condition on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The stream ended normally.
    Eof,
    /// The stream was aborted with a fatal error.
    Failed(ErrorCode),
}

/// A sticky, terminal out-of-band marker on a link.
///
/// Once set it never changes, and it is delivered to the consumer exactly
/// once through [`LinkState::acknowledge_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// What terminated the stream.
    pub kind: StatusKind,
    /// Timestamp at which the condition takes effect, in the link's base.
    pub pts: i64,
}

impl Status {
    /// End-of-stream at `pts`.
    pub fn eof(pts: i64) -> Self {
        Self {
            kind: StatusKind::Eof,
            pts,
        }
    }

    /// Fatal error at `pts`.
    pub fn failed(code: ErrorCode, pts: i64) -> Self {
        Self {
            kind: StatusKind::Failed(code),
            pts,
        }
    }

    /// Whether this status is an error rather than a normal end.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, StatusKind::Failed(_))
    }
}

/// Result of a consume attempt on a link.
#[derive(Debug)]
pub enum Consumed {
    /// Not enough frames queued and no terminal status: try again later.
    None,
    /// Frames popped from the FIFO, in push order.
    Frames(Vec<Frame>),
    /// The link is terminal; no frames will ever arrive.
    Terminal(Status),
}

/// Occupancy statistics for a link.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    /// Total frames accepted by `push`.
    pub frames_pushed: u64,
    /// Frames dropped because they arrived after a terminal status.
    pub frames_dropped: u64,
    /// Highest queue depth observed.
    pub peak_depth: usize,
}

/// The state of one link: FIFO, status slot, demand flag, stats.
#[derive(Debug)]
pub struct LinkState {
    src: NodeId,
    dst: NodeId,
    time_base: TimeBase,
    queue: VecDeque<Frame>,
    status: Option<Status>,
    acknowledged: bool,
    acknowledged_at: Option<Instant>,
    frames_wanted: bool,
    last_pts: Option<i64>,
    stats: LinkStats,
}

impl LinkState {
    /// Create a link between `src` and `dst` with the given time base.
    pub fn new(src: NodeId, dst: NodeId, time_base: TimeBase) -> Self {
        Self {
            src,
            dst,
            time_base,
            queue: VecDeque::new(),
            status: None,
            acknowledged: false,
            acknowledged_at: None,
            frames_wanted: false,
            last_pts: None,
            stats: LinkStats::default(),
        }
    }

    /// Producer endpoint.
    #[inline]
    pub fn src(&self) -> NodeId {
        self.src
    }

    /// Consumer endpoint.
    #[inline]
    pub fn dst(&self) -> NodeId {
        self.dst
    }

    /// Declared time base for timestamps on this link.
    #[inline]
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    /// Number of frames currently queued.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Occupancy statistics.
    #[inline]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Timestamp of the most recently pushed frame.
    #[inline]
    pub fn last_pts(&self) -> Option<i64> {
        self.last_pts
    }

    /// Append a frame to the FIFO tail.
    ///
    /// Returns `true` if the frame was queued (the caller should wake the
    /// consumer). A push after a terminal status is not an error: the status
    /// supersedes data, so the frame is dropped with a warning.
    pub fn push(&mut self, frame: Frame) -> bool {
        if self.status.is_some() {
            self.stats.frames_dropped += 1;
            tracing::warn!(
                pts = frame.pts(),
                "frame pushed after terminal status, dropping"
            );
            return false;
        }
        self.last_pts = Some(frame.pts());
        self.queue.push_back(frame);
        self.frames_wanted = false;
        self.stats.frames_pushed += 1;
        self.stats.peak_depth = self.stats.peak_depth.max(self.queue.len());
        true
    }

    /// Pop at least `min` and at most `max` frames, if available.
    ///
    /// With fewer than `min` frames queued this returns [`Consumed::None`]
    /// (not an error) — unless the link is terminal. A terminal status pins
    /// the stream length, so any remaining frames are handed out as a final
    /// partial batch; once drained, the terminal status is returned.
    pub fn try_consume(&mut self, min: usize, max: usize) -> Consumed {
        let min = min.max(1);
        if self.queue.len() < min {
            return match self.status {
                Some(status) if self.queue.is_empty() => Consumed::Terminal(status),
                Some(_) => {
                    let n = self.queue.len().min(max.max(1));
                    Consumed::Frames(self.queue.drain(..n).collect())
                }
                None => Consumed::None,
            };
        }
        let n = self.queue.len().min(max.max(min));
        Consumed::Frames(self.queue.drain(..n).collect())
    }

    /// Non-destructive lookahead at queue position `index`.
    pub fn peek(&self, index: usize) -> Option<&Frame> {
        self.queue.get(index)
    }

    /// Set the terminal status from the producer side. Sticky: the first
    /// writer wins.
    ///
    /// Frames already queued remain consumable; the consumer sees the
    /// status only once the queue has drained. Frames arriving *after* the
    /// status are superseded by it and dropped (see [`push`](Self::push)).
    /// Returns `true` when the status actually transitioned (the caller
    /// should wake the consumer).
    pub fn set_status(&mut self, status: Status) -> bool {
        if self.status.is_some() {
            return false;
        }
        self.status = Some(status);
        self.frames_wanted = false;
        true
    }

    /// Set the terminal status from the consumer side ("stop sending").
    ///
    /// Nobody will consume the queued frames, so they are discarded.
    /// Returns `true` when the status actually transitioned (the caller
    /// should wake the producer).
    pub fn close(&mut self, status: Status) -> bool {
        if self.status.is_some() {
            return false;
        }
        if !self.queue.is_empty() {
            tracing::debug!(
                discarded = self.queue.len(),
                pts = status.pts,
                "closing link discards queued frames"
            );
            self.queue.clear();
        }
        self.status = Some(status);
        self.acknowledged = true;
        self.acknowledged_at = Some(Instant::now());
        self.frames_wanted = false;
        true
    }

    /// Deliver the pending status exactly once.
    ///
    /// Queued frames are delivered first: while any remain, this returns
    /// `None`. The first call on a drained terminal link returns the status
    /// and records the acknowledgment instant for latency accounting; every
    /// later call returns `None`.
    pub fn acknowledge_status(&mut self) -> Option<Status> {
        if self.acknowledged || !self.queue.is_empty() {
            return None;
        }
        let status = self.status?;
        self.acknowledged = true;
        self.acknowledged_at = Some(Instant::now());
        Some(status)
    }

    /// The status slot, whether or not it has been acknowledged.
    #[inline]
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    /// A status that has been set but not yet acknowledged.
    #[inline]
    pub fn pending_status(&self) -> Option<Status> {
        if self.acknowledged { None } else { self.status }
    }

    /// Whether a terminal status has been set.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_some()
    }

    /// Whether the terminal status has been delivered to the consumer.
    #[inline]
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// When the status was acknowledged, for latency accounting.
    #[inline]
    pub fn acknowledged_at(&self) -> Option<Instant> {
        self.acknowledged_at
    }

    /// Record downstream demand for a frame.
    ///
    /// Returns `true` when the flag transitioned (the caller should wake the
    /// producer). Demand on a terminal link is meaningless and ignored.
    pub fn want_frame(&mut self) -> bool {
        if self.status.is_some() || self.frames_wanted {
            return false;
        }
        self.frames_wanted = true;
        true
    }

    /// Whether downstream has signalled demand not yet satisfied by a push.
    #[inline]
    pub fn frames_wanted(&self) -> bool {
        self.frames_wanted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkState {
        LinkState::new(NodeId(0), NodeId(1), TimeBase::MILLIS)
    }

    fn frame(pts: i64) -> Frame {
        Frame::from_bytes(vec![pts as u8], pts)
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut l = link();
        for pts in 0..100 {
            assert!(l.push(frame(pts)));
        }
        let mut seen = Vec::new();
        loop {
            match l.try_consume(1, 7) {
                Consumed::Frames(frames) => seen.extend(frames.iter().map(|f| f.pts())),
                Consumed::None => break,
                Consumed::Terminal(_) => unreachable!(),
            }
        }
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_try_consume_respects_min() {
        let mut l = link();
        l.push(frame(0));
        assert!(matches!(l.try_consume(2, 4), Consumed::None));
        l.push(frame(1));
        match l.try_consume(2, 4) {
            Consumed::Frames(frames) => assert_eq!(frames.len(), 2),
            other => panic!("expected frames, got {other:?}"),
        }
    }

    #[test]
    fn test_peek_does_not_dequeue() {
        let mut l = link();
        l.push(frame(10));
        l.push(frame(20));
        assert_eq!(l.peek(0).unwrap().pts(), 10);
        assert_eq!(l.peek(1).unwrap().pts(), 20);
        assert!(l.peek(2).is_none());
        assert_eq!(l.queued(), 2);
    }

    #[test]
    fn test_status_sticky_and_acknowledged_once() {
        let mut l = link();
        assert!(l.set_status(Status::eof(50)));
        // Second set loses.
        assert!(!l.set_status(Status::failed(ErrorCode::InvalidData, 60)));
        assert_eq!(l.status(), Some(Status::eof(50)));

        let first = l.acknowledge_status().unwrap();
        assert_eq!(first, Status::eof(50));
        assert!(l.acknowledge_status().is_none());
        assert!(l.acknowledged_at().is_some());
    }

    #[test]
    fn test_frames_before_status_remain_consumable() {
        let mut l = link();
        l.push(frame(0));
        l.push(frame(10));
        l.set_status(Status::eof(10));

        // Not acknowledgeable until drained.
        assert!(l.acknowledge_status().is_none());
        match l.try_consume(1, 10) {
            Consumed::Frames(frames) => assert_eq!(frames.len(), 2),
            other => panic!("expected frames, got {other:?}"),
        }
        assert!(matches!(l.try_consume(1, 1), Consumed::Terminal(_)));
        assert_eq!(l.acknowledge_status(), Some(Status::eof(10)));
    }

    #[test]
    fn test_partial_final_batch_at_eof() {
        // A min-batch consumer still receives the tail once a status pins
        // the stream length.
        let mut l = link();
        l.push(frame(0));
        l.set_status(Status::eof(0));

        match l.try_consume(4, 4) {
            Consumed::Frames(frames) => assert_eq!(frames.len(), 1),
            other => panic!("expected final partial batch, got {other:?}"),
        }
        assert!(matches!(l.try_consume(4, 4), Consumed::Terminal(_)));
    }

    #[test]
    fn test_close_discards_queue() {
        let mut l = link();
        l.push(frame(0));
        l.push(frame(1));
        l.close(Status::eof(1));
        assert_eq!(l.queued(), 0);
        assert!(l.is_acknowledged());
        assert!(matches!(l.try_consume(1, 1), Consumed::Terminal(_)));
        // The consumer set the status; there is nothing left to deliver.
        assert!(l.acknowledge_status().is_none());
    }

    #[test]
    fn test_push_after_status_drops() {
        let mut l = link();
        l.set_status(Status::eof(0));
        assert!(!l.push(frame(5)));
        assert_eq!(l.queued(), 0);
        assert_eq!(l.stats().frames_dropped, 1);
    }

    #[test]
    fn test_want_frame_transitions_once() {
        let mut l = link();
        assert!(l.want_frame());
        assert!(!l.want_frame());
        assert!(l.frames_wanted());
        // A push satisfies the demand.
        l.push(frame(0));
        assert!(!l.frames_wanted());
    }

    #[test]
    fn test_want_frame_ignored_on_terminal() {
        let mut l = link();
        l.set_status(Status::eof(0));
        assert!(!l.want_frame());
        assert!(!l.frames_wanted());
    }

    #[test]
    fn test_stats_track_peak_depth() {
        let mut l = link();
        for pts in 0..5 {
            l.push(frame(pts));
        }
        l.try_consume(1, 3);
        l.push(frame(5));
        assert_eq!(l.stats().frames_pushed, 6);
        assert_eq!(l.stats().peak_depth, 5);
    }
}
