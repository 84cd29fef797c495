//! Frame-aligned repaint bookkeeping.
//!
//! Mutations, scrolls, resizes and selection changes all invalidate the
//! highlight layer, often several times within one frame. The scheduler
//! folds them into a single pending set so the host requests at most one
//! animation frame, and reads geometry only once layout has settled.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RepaintTriggers: u8 {
        /// Content under the container changed; ranges must be revived.
        const MUTATION = 1 << 0;
        const SCROLL = 1 << 1;
        const RESIZE = 1 << 2;
        /// Selection changed; cached geometry is still valid.
        const SELECTION = 1 << 3;
    }
}

impl RepaintTriggers {
    /// Whether stored selectors have to be anchored again.
    pub fn needs_revival(self) -> bool {
        self.contains(Self::MUTATION)
    }

    /// Whether rectangles have to be measured again.
    pub fn needs_layout(self) -> bool {
        self.intersects(Self::MUTATION | Self::SCROLL | Self::RESIZE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepaintScheduler {
    pending: RepaintTriggers,
    frame_requested: bool,
}

impl RepaintScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trigger. Returns `true` when the caller must request a frame;
    /// later triggers before [`take`](Self::take) ride along with it.
    pub fn notify(&mut self, trigger: RepaintTriggers) -> bool {
        self.pending |= trigger;
        if self.frame_requested {
            tracing::trace!(target: "marginalia::schedule", ?trigger, "coalesced into pending frame");
            return false;
        }
        self.frame_requested = true;
        tracing::trace!(target: "marginalia::schedule", ?trigger, "requesting frame");
        true
    }

    /// Called from the frame callback: everything since the last frame.
    pub fn take(&mut self) -> RepaintTriggers {
        self.frame_requested = false;
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> RepaintTriggers {
        self.pending
    }

    pub fn is_frame_requested(&self) -> bool {
        self.frame_requested
    }

    /// Forget pending work, e.g. when the layer is torn down.
    pub fn cancel(&mut self) {
        self.pending = RepaintTriggers::empty();
        self.frame_requested = false;
    }
}
