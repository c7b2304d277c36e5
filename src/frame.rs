//! Frames: timestamped, reference-shared units of media data.
//!
//! A [`Frame`] pairs an opaque payload with a presentation timestamp in the
//! carrying link's declared time base. Payloads are shared by reference:
//! cloning a frame is an `Arc` increment, and a holder that needs to mutate
//! first calls [`Frame::make_writable`], which copies only when the payload
//! is actually shared. The last holder dropping the frame releases the
//! payload; there are no manual release calls.

use crate::error::{Error, Result};
use std::sync::Arc;

/// Flags describing frame properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags {
    /// Frame is a sync point (safe place to start consuming).
    pub sync_point: bool,
    /// Frame content is known to be corrupted or incomplete.
    pub corrupted: bool,
    /// Frame is a gap/discontinuity marker.
    pub gap: bool,
}

/// Opaque frame payload: a format tag plus raw bytes.
///
/// The scheduling core never interprets the bytes; the format tag exists so
/// a node can reject payloads it does not understand with `InvalidData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Caller-defined format descriptor (fourcc-style tag, sample layout id).
    pub format: u32,
    /// Raw payload bytes.
    pub data: Vec<u8>,
}

/// A timestamped unit of media data flowing through the graph.
#[derive(Debug, Clone)]
pub struct Frame {
    payload: Arc<Payload>,
    pts: i64,
    duration: Option<i64>,
    sequence: u64,
    flags: FrameFlags,
}

impl Frame {
    /// Create a frame around an existing payload.
    pub fn new(payload: Payload, pts: i64) -> Self {
        Self {
            payload: Arc::new(payload),
            pts,
            duration: None,
            sequence: 0,
            flags: FrameFlags::default(),
        }
    }

    /// Allocate a zeroed frame payload of `len` bytes.
    ///
    /// This is the allocator seam: ownership transfers to the caller and
    /// allocation failure surfaces as [`Error::OutOfMemory`] rather than an
    /// abort.
    pub fn alloc(format: u32, len: usize, pts: i64) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::OutOfMemory(format!("frame payload of {len} bytes")))?;
        data.resize(len, 0);
        Ok(Self::new(Payload { format, data }, pts))
    }

    /// Build a frame from raw bytes with format 0.
    pub fn from_bytes(data: Vec<u8>, pts: i64) -> Self {
        Self::new(Payload { format: 0, data }, pts)
    }

    /// Presentation timestamp, in the carrying link's time base.
    #[inline]
    pub fn pts(&self) -> i64 {
        self.pts
    }

    /// Set the presentation timestamp.
    pub fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }

    /// Duration in ticks, if declared.
    #[inline]
    pub fn duration(&self) -> Option<i64> {
        self.duration
    }

    /// Builder-style duration.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Monotone sequence number assigned by the producer.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Builder-style sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Frame flags.
    #[inline]
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Builder-style flags.
    pub fn with_flags(mut self, flags: FrameFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Shared read-only view of the payload.
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether this holder has the only reference to the payload.
    pub fn is_writable(&self) -> bool {
        Arc::strong_count(&self.payload) == 1
    }

    /// Exclusive mutable access to the payload.
    ///
    /// If the payload is shared with other holders it is copied first, so
    /// readers elsewhere in the graph never observe the mutation.
    pub fn make_writable(&mut self) -> &mut Payload {
        Arc::make_mut(&mut self.payload)
    }

    /// Number of holders currently sharing the payload.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_payload() {
        let a = Frame::from_bytes(vec![1, 2, 3], 0);
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert_eq!(b.payload().data, vec![1, 2, 3]);
        assert!(!a.is_writable());
    }

    #[test]
    fn test_make_writable_copies_when_shared() {
        let a = Frame::from_bytes(vec![1, 2, 3], 0);
        let mut b = a.clone();

        b.make_writable().data[0] = 9;

        // The original holder never observes the mutation.
        assert_eq!(a.payload().data, vec![1, 2, 3]);
        assert_eq!(b.payload().data, vec![9, 2, 3]);
        assert!(a.is_writable());
        assert!(b.is_writable());
    }

    #[test]
    fn test_make_writable_in_place_when_exclusive() {
        let mut a = Frame::from_bytes(vec![1, 2, 3], 0);
        let before = a.payload().data.as_ptr();
        a.make_writable().data[0] = 9;
        // Exclusive holder mutates in place, no copy.
        assert_eq!(a.payload().data.as_ptr(), before);
    }

    #[test]
    fn test_alloc_zeroed() {
        let frame = Frame::alloc(0x52474241, 16, 100).unwrap();
        assert_eq!(frame.payload().data.len(), 16);
        assert!(frame.payload().data.iter().all(|&b| b == 0));
        assert_eq!(frame.pts(), 100);
        assert_eq!(frame.payload().format, 0x52474241);
    }

    #[test]
    fn test_builder_fields() {
        let frame = Frame::from_bytes(vec![], 10)
            .with_duration(5)
            .with_sequence(7);
        assert_eq!(frame.duration(), Some(5));
        assert_eq!(frame.sequence(), 7);
    }
}
