//! Periodic snapshot hand-off to a renderer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::snapshot::{Snapshot, SnapshotEntry, SnapshotService};
use crate::state::RefreshState;

/// Something that draws snapshots: a plot window, a terminal, a log.
pub trait Renderer: Send {
    fn render(&mut self, snapshot: &Snapshot);
}

/// Renderer that writes the latest reading to the tracing log.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<SnapshotEntry>,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &Snapshot) {
        let Some(current) = &snapshot.current else {
            return;
        };

        trace!(
            "{:.2} Hz {} ({} points)",
            current.frequency,
            current.status,
            snapshot.history.len()
        );

        if self.last.as_ref() != Some(current) {
            debug!(
                "Latest reading {:.2} Hz, {} at {}",
                current.frequency, current.status, current.timestamp
            );
            self.last = Some(current.clone());
        }
    }
}

/// Pulls a snapshot every `period` and hands it to a [`Renderer`].
///
/// The renderer works on its own copy of the history, so a slow render only
/// delays the next tick and never holds up ingestion.
pub struct RefreshLoop<R> {
    snapshots: SnapshotService,
    renderer: R,
    period: Duration,
    state: Arc<RefreshState>,
}

impl<R: Renderer + 'static> RefreshLoop<R> {
    pub fn new(
        snapshots: SnapshotService,
        renderer: R,
        period: Duration,
        state: Arc<RefreshState>,
    ) -> Self {
        Self {
            snapshots,
            renderer,
            period,
            state,
        }
    }

    /// Run the loop on the runtime until [`RefreshState::signal_stop`].
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the loop on the current task.
    pub async fn run(mut self) {
        let mut stop_rx = self.state.subscribe_stop();
        if *stop_rx.borrow() {
            return;
        }

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.state.set_running(true);
        info!("Refresh loop started ({:?} period)", self.period);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let rendered = self.tick();
                    self.state.record_tick(rendered);
                }
            }
        }

        self.state.set_running(false);
        info!("Refresh loop stopped");
    }

    /// Render once if there is anything to show.
    fn tick(&mut self) -> bool {
        let snapshot = self.snapshots.current_snapshot();
        if snapshot.history.is_empty() {
            return false;
        }
        self.renderer.render(&snapshot);
        true
    }
}
