//! Frame stacks for nested sequences
//!
//! Each open SEQUENCE/SET is one frame. Frames live in a vector indexed by
//! depth and are reused across siblings: pushing resets an existing slot
//! instead of allocating, popping only moves the depth back. The root level
//! is implicit (depth 0) and never occupies a slot.

use bytes::BytesMut;

/// State of one nesting level
pub(crate) trait Frame: Default {
    /// Prepare a pooled frame for reuse
    fn reset(&mut self);
}

/// Decode side: where the enclosing sequence ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodeFrame {
    /// Absolute stream offset (in consumed bytes) at which the sequence ends
    pub limit: u64,
}

impl DecodeFrame {
    /// Bytes still readable in this frame after `consumed` stream bytes
    pub fn remaining(&self, consumed: u64) -> usize {
        self.limit.saturating_sub(consumed) as usize
    }
}

impl Frame for DecodeFrame {
    fn reset(&mut self) {
        self.limit = 0;
    }
}

/// Encode side: content of a sequence whose length is not known yet
#[derive(Debug, Default)]
pub(crate) struct EncodeFrame {
    pub tag: u8,
    pub buffer: BytesMut,
}

impl Frame for EncodeFrame {
    fn reset(&mut self) {
        self.tag = 0;
        // keeps the allocation for the next sequence at this depth
        self.buffer.clear();
    }
}

/// Depth-indexed pool of frames
#[derive(Debug, Default)]
pub(crate) struct FrameStack<F> {
    frames: Vec<F>,
    depth: usize,
}

impl<F: Frame> FrameStack<F> {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            depth: 0,
        }
    }

    /// Number of open frames
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of frames allocated so far
    pub fn pooled(&self) -> usize {
        self.frames.len()
    }

    /// Open a new frame, reusing a pooled slot when one exists
    ///
    /// # Returns
    /// The reset frame, for the caller to initialize.
    pub fn push(&mut self) -> &mut F {
        if self.depth == self.frames.len() {
            self.frames.push(F::default());
        }
        let frame = &mut self.frames[self.depth];
        frame.reset();
        self.depth += 1;
        frame
    }

    /// Close the innermost frame; `false` when no frame is open
    pub fn pop(&mut self) -> bool {
        if self.depth == 0 {
            return false;
        }
        self.depth -= 1;
        true
    }

    /// Innermost open frame
    pub fn current(&self) -> Option<&F> {
        self.depth.checked_sub(1).map(|top| &self.frames[top])
    }

    /// Innermost open frame, mutably
    pub fn current_mut(&mut self) -> Option<&mut F> {
        self.depth.checked_sub(1).map(|top| &mut self.frames[top])
    }

    /// Innermost frame together with its parent
    ///
    /// # Returns
    /// `None` when no frame is open, otherwise `(parent, top)` where a
    /// `None` parent means the root level.
    pub fn split_top(&mut self) -> Option<(Option<&mut F>, &mut F)> {
        if self.depth == 0 {
            return None;
        }
        let (below, rest) = self.frames[..self.depth].split_at_mut(self.depth - 1);
        Some((below.last_mut(), &mut rest[0]))
    }

    /// Close every frame, keeping the pool
    pub fn clear(&mut self) {
        self.depth = 0;
    }
}
