//! The accessibility service: reacts to window changes in the mail client.
//!
//! On every content change the previous overlay is removed, the tree is
//! searched for armored messages, and one decrypt button is shown over the
//! first match. Tapping the button rebuilds the armor of that match and hands
//! it to the decryptor.

use crate::config::Config;
use crate::decrypt::{decrypt_node, DecryptError, DecryptRequest, IntentLauncher};
use crate::locator::{NodeLocator, NodeSnapshot, UiNode};
use crate::overlay::{OverlayId, OverlayPresenter};
use crate::temp_storage::TemporaryStorage;
use crate::types::{ArmorError, PgpNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of accessibility notification delivered by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WindowContentChanged,
    WindowStateChanged,
    ViewScrolled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A decrypt was requested for a node the last scan did not find
    #[error("No pending node at index {0}")]
    NoPendingNode(usize),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

/// State of the running service.
pub struct ArmorService<L: IntentLauncher, O: OverlayPresenter> {
    locator: NodeLocator,
    storage: TemporaryStorage,
    launcher: L,
    overlay: O,
    action: String,
    /// The only overlay that may be visible
    current_overlay: Option<OverlayId>,
    /// Matches of the last scan
    pending: Vec<PgpNode>,
}

impl<L: IntentLauncher, O: OverlayPresenter> ArmorService<L, O> {
    pub fn new(config: &Config, storage: TemporaryStorage, launcher: L, overlay: O) -> Self {
        Self {
            locator: NodeLocator::new(&config.locator.web_view_class, &config.locator.text_run_class),
            storage,
            launcher,
            overlay,
            action: config.decrypt.action.clone(),
            current_overlay: None,
            pending: Vec::new(),
        }
    }

    /// Handle one accessibility notification. Returns the number of matches.
    ///
    /// Only content changes trigger a scan. A missing root (the window went
    /// away) leaves the current state untouched.
    pub fn on_accessibility_event<N: UiNode>(&mut self, event_type: EventType, root: Option<N>) -> usize {
        if event_type != EventType::WindowContentChanged {
            log::trace!("[SERVICE] Ignoring {:?}", event_type);
            return 0;
        }
        log::debug!("[SERVICE] Window content changed");

        let root = match root {
            Some(root) => root,
            None => return 0,
        };

        self.close_overlay();

        // Copy the tree once and let go of the platform handles before searching
        let snapshot = NodeSnapshot::capture(&root);
        drop(root);
        log::trace!("[SERVICE] Captured {} nodes", snapshot.node_count());
        self.pending = self.locator.find_pgp_nodes(&&snapshot);

        if let Some(first) = self.pending.first() {
            self.current_overlay = Some(self.overlay.show(first));
        }

        if self.pending.len() > 1 {
            log::debug!(
                "[SERVICE] {} messages on screen, button shown for the first",
                self.pending.len()
            );
        }
        self.pending.len()
    }

    /// The decrypt button was tapped.
    pub fn on_overlay_clicked(&mut self) -> Result<DecryptRequest, ServiceError> {
        self.decrypt_pending(0)
    }

    /// The close button of the overlay was tapped.
    pub fn on_overlay_closed(&mut self) {
        self.close_overlay();
    }

    /// The service is being destroyed.
    pub fn on_destroy(&mut self) {
        self.close_overlay();
        self.pending.clear();
    }

    /// Decrypt the `index`-th match of the last scan.
    ///
    /// A failure is logged and returned; it never affects the other matches.
    pub fn decrypt_pending(&mut self, index: usize) -> Result<DecryptRequest, ServiceError> {
        self.close_overlay();

        let node = self
            .pending
            .get(index)
            .cloned()
            .ok_or(ServiceError::NoPendingNode(index))?;

        decrypt_node(&node, &self.storage, &mut self.launcher, &self.action).map_err(|e| {
            match &e {
                DecryptError::Armor(ArmorError::NoPayloadMarker(msg)) => {
                    log::warn!("[SERVICE] ⏭️  Not an encrypted message, skipping: {}", msg);
                }
                DecryptError::Armor(ArmorError::TruncatedFooter(msg)) => {
                    log::warn!("[SERVICE] ✂️  Message cut off by the mail client: {}", msg);
                }
                DecryptError::TemporaryStoreWriteFailure(err) => {
                    log::error!("[SERVICE] ❌ Write to temporary store failed: {}", err);
                }
                DecryptError::LaunchFailed(msg) => {
                    log::error!("[SERVICE] ❌ Could not start decryptor: {}", msg);
                }
            }
            ServiceError::Decrypt(e)
        })
    }

    pub fn pending_nodes(&self) -> &[PgpNode] {
        &self.pending
    }

    pub fn current_overlay(&self) -> Option<OverlayId> {
        self.current_overlay
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn storage(&self) -> &TemporaryStorage {
        &self.storage
    }

    fn close_overlay(&mut self) {
        if let Some(id) = self.current_overlay.take() {
            if self.overlay.is_attached(id) {
                self.overlay.remove(id);
            }
        }
    }
}
