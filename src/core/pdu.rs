//! PDU slices
//!
//! A `PduSlice` is the unit of work handed to a protocol decoder: an
//! immutable window onto a flow's reassembled payload buffer plus the
//! arrival timestamp of the data. Decoders narrow the window as they
//! consume headers; a slice passed to a child layer is always a sub-range
//! of the slice its parent received, so consumed bytes never reappear
//! downstream.
//!
//! Slices are constructed fresh per dispatch call and never outlive it.
//! Decoders needing cross-packet memory store derived values in context
//! state instead.

use chrono::{DateTime, Utc};

/// Immutable view over a range of a flow's payload buffer.
#[derive(Debug, Clone, Copy)]
pub struct PduSlice<'a> {
    buf: &'a [u8],
    begin: usize,
    end: usize,
    time: DateTime<Utc>,
}

impl<'a> PduSlice<'a> {
    /// View covering the whole buffer.
    pub fn new(buf: &'a [u8], time: DateTime<Utc>) -> Self {
        Self {
            buf,
            begin: 0,
            end: buf.len(),
            time,
        }
    }

    /// The visible bytes.
    pub fn bytes(&self) -> &'a [u8] {
        &self.buf[self.begin..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Arrival time of the data this slice views.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Offset of the window start within the underlying buffer. Useful in
    /// diagnostics to report where in the original payload a layer began.
    pub fn offset(&self) -> usize {
        self.begin
    }

    /// Sub-range with the first `n` bytes consumed, or `None` if the slice
    /// holds fewer than `n` bytes. The result views the same buffer, so
    /// the sub-range invariant holds by construction.
    pub fn advance(&self, n: usize) -> Option<PduSlice<'a>> {
        if n > self.len() {
            return None;
        }
        Some(Self {
            buf: self.buf,
            begin: self.begin + n,
            end: self.end,
            time: self.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_views_whole_buffer() {
        let buf = [1u8, 2, 3, 4, 5];
        let s = PduSlice::new(&buf, Utc::now());
        assert_eq!(s.bytes(), &buf);
        assert_eq!(s.len(), 5);
        assert_eq!(s.offset(), 0);
        assert!(!s.is_empty());
    }

    #[test]
    fn test_advance_narrows() {
        let buf = [1u8, 2, 3, 4, 5];
        let s = PduSlice::new(&buf, Utc::now());
        let inner = s.advance(2).unwrap();
        assert_eq!(inner.bytes(), &[3, 4, 5]);
        assert_eq!(inner.offset(), 2);
        assert_eq!(inner.time(), s.time());

        let empty = inner.advance(3).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_advance_past_end_refused() {
        let buf = [1u8, 2];
        let s = PduSlice::new(&buf, Utc::now());
        assert!(s.advance(3).is_none());
    }
}
