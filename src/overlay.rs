//! The floating "decrypt" button shown over a matched message.
//!
//! Drawing is left to the platform; the service only needs to show one button
//! anchored at a node and remove it again.

use crate::types::PgpNode;
use std::collections::HashSet;

/// Identifies one shown overlay.
pub type OverlayId = u64;

pub trait OverlayPresenter {
    /// Show a decrypt button anchored at `anchor` and return its id.
    fn show(&mut self, anchor: &PgpNode) -> OverlayId;

    /// Remove a previously shown overlay. Unknown ids are ignored.
    fn remove(&mut self, id: OverlayId);

    /// Whether the overlay is still attached to the screen.
    fn is_attached(&self, id: OverlayId) -> bool;
}

/// Overlay presenter without a screen: tracks attached overlays and logs them.
#[derive(Debug, Default)]
pub struct LoggingOverlay {
    next_id: OverlayId,
    attached: HashSet<OverlayId>,
}

impl LoggingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of overlays currently attached.
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }
}

impl OverlayPresenter for LoggingOverlay {
    fn show(&mut self, anchor: &PgpNode) -> OverlayId {
        self.next_id += 1;
        let id = self.next_id;
        self.attached.insert(id);
        log::info!(
            "[OVERLAY] Showing decrypt button #{} at ({}, {})-({}, {})",
            id,
            anchor.bounds.left,
            anchor.bounds.top,
            anchor.bounds.right,
            anchor.bounds.bottom
        );
        id
    }

    fn remove(&mut self, id: OverlayId) {
        if self.attached.remove(&id) {
            log::debug!("[OVERLAY] Removed decrypt button #{}", id);
        }
    }

    fn is_attached(&self, id: OverlayId) -> bool {
        self.attached.contains(&id)
    }
}
