//! Single-consumer event loop driving an [`ArmorService`].
//!
//! Events are handled strictly one at a time. When several content-changed
//! notifications are waiting back to back, only the newest is scanned; the
//! older ones would only have produced overlays that are removed right away.

use crate::decrypt::IntentLauncher;
use crate::locator::NodeSnapshot;
use crate::overlay::OverlayPresenter;
use crate::service::{ArmorService, EventType};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Capacity of the event channel.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// One event delivered to the service, as read from the event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// Accessibility notification with the window root at delivery time
    Accessibility {
        event_type: EventType,
        #[serde(default)]
        root: Option<NodeSnapshot>,
    },
    /// Decrypt button tapped (`index` picks one of several matches)
    OverlayClicked {
        #[serde(default)]
        index: usize,
    },
    OverlayClosed,
    Shutdown,
}

impl ServiceEvent {
    fn is_content_changed(&self) -> bool {
        matches!(
            self,
            ServiceEvent::Accessibility {
                event_type: EventType::WindowContentChanged,
                ..
            }
        )
    }

    /// A content change that can replace an older queued one.
    ///
    /// Without a root nothing would be scanned, so it must not displace a scan.
    fn supersedes_scan(&self) -> bool {
        matches!(
            self,
            ServiceEvent::Accessibility {
                event_type: EventType::WindowContentChanged,
                root: Some(_),
            }
        )
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonStats {
    pub events: usize,
    pub scans: usize,
    pub superseded: usize,
    pub matches: usize,
    pub decrypted: usize,
    pub failed: usize,
}

/// Create the event channel.
pub fn channel() -> (mpsc::Sender<ServiceEvent>, mpsc::Receiver<ServiceEvent>) {
    mpsc::channel(EVENT_QUEUE_CAPACITY)
}

/// Handle events until the channel closes or a `Shutdown` event arrives.
pub async fn run<L, O>(service: &mut ArmorService<L, O>, mut rx: mpsc::Receiver<ServiceEvent>) -> DaemonStats
where
    L: IntentLauncher,
    O: OverlayPresenter,
{
    let mut stats = DaemonStats::default();
    let mut held: Option<ServiceEvent> = None;

    loop {
        let mut event = match held.take() {
            Some(event) => event,
            None => match rx.recv().await {
                Some(event) => {
                    stats.events += 1;
                    event
                }
                None => break,
            },
        };

        if event.supersedes_scan() {
            while let Ok(next) = rx.try_recv() {
                stats.events += 1;
                if next.supersedes_scan() {
                    stats.superseded += 1;
                    event = next;
                } else if next.is_content_changed() {
                    // Rootless change: the service would ignore it anyway
                    log::trace!("[DAEMON] Dropping content change without a root");
                } else {
                    held = Some(next);
                    break;
                }
            }
        }

        if !handle_event(service, event, &mut stats) {
            break;
        }
    }

    service.on_destroy();
    log::info!(
        "[DAEMON] Stopped after {} events ({} scans, {} superseded, {} decrypted, {} failed)",
        stats.events,
        stats.scans,
        stats.superseded,
        stats.decrypted,
        stats.failed
    );
    stats
}

/// Returns `false` when the loop should stop.
fn handle_event<L, O>(service: &mut ArmorService<L, O>, event: ServiceEvent, stats: &mut DaemonStats) -> bool
where
    L: IntentLauncher,
    O: OverlayPresenter,
{
    match event {
        ServiceEvent::Accessibility { event_type, root } => {
            if event_type == EventType::WindowContentChanged && root.is_some() {
                stats.scans += 1;
            }
            stats.matches += service.on_accessibility_event(event_type, root.as_ref());
        }
        ServiceEvent::OverlayClicked { index } => match service.decrypt_pending(index) {
            Ok(_) => stats.decrypted += 1,
            Err(e) => {
                stats.failed += 1;
                log::debug!("[DAEMON] Decrypt request failed: {}", e);
            }
        },
        ServiceEvent::OverlayClosed => service.on_overlay_closed(),
        ServiceEvent::Shutdown => return false,
    }
    true
}
