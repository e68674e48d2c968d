//! Playback glue: media time to annotated display
//!
//! [`PlaybackSession`] maps time updates onto the loaded [`Timeline`] and
//! stamps every subtitle change with a new pass id. Annotation passes run as
//! background tasks; a finished pass is applied only if its id is still the
//! current one, so a slow pass for an earlier subtitle can never overwrite a
//! newer one.
//!
//! [`PlaybackDriver`] runs that loop over a channel of time updates, e.g.
//! from [`simulated_clock`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::annotate::pipeline::{Annotate, SubtitleView};
use crate::annotate::subtitle::{millis_from_secs, SubtitleEntry, Timeline};

/// Identifies one display pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassTicket {
    pub pass: u64,
    /// Index of the entry in the timeline
    pub index: usize,
    pub entry: SubtitleEntry,
}

/// Result of a time update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Same subtitle (or still none) as before
    Unchanged,
    /// Left every subtitle; the display should clear
    Cleared { pass: u64 },
    /// A different subtitle became active
    Started(PassTicket),
}

#[derive(Debug, Default)]
struct SessionState {
    timeline: Timeline,
    active: Option<usize>,
    generation: u64,
}

/// Active-subtitle tracking with generation-stamped passes
#[derive(Debug, Default)]
pub struct PlaybackSession {
    state: Mutex<SessionState>,
}

impl PlaybackSession {
    #[must_use]
    pub fn new(timeline: Timeline) -> Self {
        Self {
            state: Mutex::new(SessionState {
                timeline,
                ..SessionState::default()
            }),
        }
    }

    /// Replace the timeline. Passes started before the load become stale.
    pub fn load(&self, entries: Vec<SubtitleEntry>) {
        let mut state = self.state();
        state.timeline.load(entries);
        state.active = None;
        state.generation += 1;
    }

    /// Feed a playback time in seconds
    pub fn on_time(&self, secs: f64) -> Transition {
        let mut state = self.state();
        let index = state.timeline.active_index(millis_from_secs(secs));
        if index == state.active {
            return Transition::Unchanged;
        }

        state.active = index;
        state.generation += 1;
        let pass = state.generation;

        match index.and_then(|i| state.timeline.get(i).cloned().map(|entry| (i, entry))) {
            Some((index, entry)) => Transition::Started(PassTicket { pass, index, entry }),
            None => Transition::Cleared { pass },
        }
    }

    /// Whether `pass` is still the newest pass
    #[must_use]
    pub fn is_current(&self, pass: u64) -> bool {
        self.state().generation == pass
    }

    /// Hand back `view` if `pass` is still current; `None` discards it.
    #[must_use]
    pub fn commit(&self, pass: u64, view: SubtitleView) -> Option<SubtitleView> {
        self.is_current(pass).then_some(view)
    }

    /// Index of the active entry
    #[must_use]
    pub fn active(&self) -> Option<usize> {
        self.state().active
    }

    /// Latest end time in the loaded timeline
    #[must_use]
    pub fn end_ms(&self) -> u64 {
        self.state().timeline.end_ms()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Change to apply to the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayUpdate {
    Show {
        pass: u64,
        index: usize,
        entry: SubtitleEntry,
        view: SubtitleView,
    },
    Clear,
}

/// Counters from one driver run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Annotation passes started
    pub started: usize,
    /// Passes whose result reached the display
    pub applied: usize,
    /// Passes superseded before reaching the display
    pub discarded: usize,
}

/// Runs annotation passes for incoming time updates
pub struct PlaybackDriver {
    session: Arc<PlaybackSession>,
    annotator: Arc<dyn Annotate>,
}

impl PlaybackDriver {
    pub fn new(session: Arc<PlaybackSession>, annotator: Arc<dyn Annotate>) -> Self {
        Self { session, annotator }
    }

    /// Consume time updates until the channel closes, then wait for passes
    /// still in flight. A pass superseded by a newer transition is aborted.
    pub async fn run(
        &self,
        mut times: mpsc::Receiver<f64>,
        updates: mpsc::Sender<DisplayUpdate>,
    ) -> DriverStats {
        let mut stats = DriverStats::default();
        let mut passes: JoinSet<(PassTicket, SubtitleView)> = JoinSet::new();
        let mut current: Option<AbortHandle> = None;
        let mut open = true;

        loop {
            tokio::select! {
                time = times.recv(), if open => match time {
                    Some(secs) => {
                        self.on_time(secs, &mut passes, &mut current, &updates, &mut stats)
                            .await;
                    }
                    None => {
                        debug!(in_flight = passes.len(), "Time source closed");
                        open = false;
                    }
                },
                Some(joined) = passes.join_next() => match joined {
                    Ok((ticket, view)) => self.finish(ticket, view, &updates, &mut stats).await,
                    Err(e) if e.is_cancelled() => {
                        debug!("Superseded annotation pass aborted");
                        stats.discarded += 1;
                    }
                    Err(e) => warn!(error = %e, "Annotation task failed"),
                },
                else => break,
            }
        }

        info!(
            started = stats.started,
            applied = stats.applied,
            discarded = stats.discarded,
            "Playback finished"
        );
        stats
    }

    async fn on_time(
        &self,
        secs: f64,
        passes: &mut JoinSet<(PassTicket, SubtitleView)>,
        current: &mut Option<AbortHandle>,
        updates: &mpsc::Sender<DisplayUpdate>,
        stats: &mut DriverStats,
    ) {
        let transition = self.session.on_time(secs);
        if !matches!(transition, Transition::Unchanged) {
            if let Some(previous) = current.take() {
                previous.abort();
            }
        }
        match transition {
            Transition::Unchanged => {}
            Transition::Cleared { pass } => {
                debug!(pass, secs, "Subtitle cleared");
                send(updates, DisplayUpdate::Clear).await;
            }
            Transition::Started(ticket) => {
                debug!(pass = ticket.pass, index = ticket.index, secs, "Subtitle started");
                stats.started += 1;
                let annotator = Arc::clone(&self.annotator);
                *current = Some(passes.spawn(async move {
                    let view = annotator.annotate(&ticket.entry.text).await;
                    (ticket, view)
                }));
            }
        }
    }

    async fn finish(
        &self,
        ticket: PassTicket,
        view: SubtitleView,
        updates: &mpsc::Sender<DisplayUpdate>,
        stats: &mut DriverStats,
    ) {
        let Some(view) = self.session.commit(ticket.pass, view) else {
            debug!(pass = ticket.pass, "Discarding stale annotation pass");
            stats.discarded += 1;
            return;
        };
        stats.applied += 1;
        send(
            updates,
            DisplayUpdate::Show {
                pass: ticket.pass,
                index: ticket.index,
                entry: ticket.entry,
                view,
            },
        )
        .await;
    }
}

async fn send(updates: &mpsc::Sender<DisplayUpdate>, update: DisplayUpdate) {
    if updates.send(update).await.is_err() {
        debug!("Display receiver closed");
    }
}

/// Emit playback times every `tick`, starting at `start_secs`, scaled by
/// `speed`, until `end_secs` is passed.
pub fn simulated_clock(
    tick: Duration,
    start_secs: f64,
    end_secs: f64,
    speed: f64,
) -> mpsc::Receiver<f64> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut ticks = interval(tick);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let origin = Instant::now();
        loop {
            ticks.tick().await;
            let now = start_secs + origin.elapsed().as_secs_f64() * speed;
            if tx.send(now.min(end_secs)).await.is_err() || now >= end_secs {
                break;
            }
        }
    });
    rx
}
