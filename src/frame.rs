//! Decoded frame views.

/// A frame just produced by [`MediaSession::next_frame`](crate::MediaSession::next_frame).
///
/// The pixel data lives in the session's decode buffer. The borrow ties the
/// view to the session, so the next pull cannot happen while the view is
/// alive; callers that need the pixels afterwards copy them with
/// [`to_owned_frame`](DecodedFrame::to_owned_frame).
#[derive(Debug)]
pub struct DecodedFrame<'a, F> {
    sequence_index: u64,
    pixels: &'a F,
}

impl<'a, F> DecodedFrame<'a, F> {
    pub(crate) fn new(sequence_index: u64, pixels: &'a F) -> Self {
        Self {
            sequence_index,
            pixels,
        }
    }

    /// Zero-based position of this frame in decode-emission order.
    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }

    /// The engine's frame buffer.
    pub fn pixels(&self) -> &'a F {
        self.pixels
    }

    /// Copy the frame out of the session's buffer.
    pub fn to_owned_frame(&self) -> OwnedFrame<F>
    where
        F: Clone,
    {
        OwnedFrame {
            sequence_index: self.sequence_index,
            pixels: self.pixels.clone(),
        }
    }
}

/// A decoded frame copied out of the session, safe to keep.
#[derive(Debug, Clone)]
pub struct OwnedFrame<F> {
    /// Zero-based position in decode-emission order.
    pub sequence_index: u64,
    /// The copied frame buffer.
    pub pixels: F,
}
