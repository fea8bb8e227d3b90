//! Client-side trial countdown.
//!
//! The clock never keeps its own count: every tick re-derives the time left
//! from the server-confirmed `expires_at`, so a suspended process or a
//! skewed timer cannot extend a trial.

use std::sync::Arc;
use std::time::Duration;

use dailywatch_core::clock::{Clock, SystemClock};
use dailywatch_core::trial::{self, TrialPhase};
use dailywatch_core::types::Timestamp;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// What the countdown shows right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    pub phase: TrialPhase,
    pub remaining_secs: i64,
}

impl ClockState {
    /// `m:ss` rendering of the time left.
    pub fn display(&self) -> String {
        trial::format_remaining(self.remaining_secs)
    }
}

/// A running countdown task. Stopped on [`TrialClock::stop`] or drop.
pub struct TrialClock {
    state: watch::Receiver<ClockState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TrialClock {
    /// Start counting down to `expires_at` on the system clock.
    pub fn start<F>(expires_at: Timestamp, on_tick: F) -> Self
    where
        F: Fn(ClockState) + Send + 'static,
    {
        Self::start_with_clock(expires_at, Arc::new(SystemClock), on_tick)
    }

    pub fn start_with_clock<F>(expires_at: Timestamp, clock: Arc<dyn Clock>, on_tick: F) -> Self
    where
        F: Fn(ClockState) + Send + 'static,
    {
        let initial = ClockState {
            phase: TrialPhase::Active,
            remaining_secs: trial::remaining_secs(expires_at, clock.now()),
        };
        let (sender, state) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(expires_at, clock, sender, cancel.clone(), on_tick));

        Self {
            state,
            cancel,
            handle,
        }
    }

    /// Latest published state.
    pub fn state(&self) -> ClockState {
        *self.state.borrow()
    }

    /// A receiver that wakes on every published state.
    pub fn subscribe(&self) -> watch::Receiver<ClockState> {
        self.state.clone()
    }

    /// Stop ticking. No callback runs after this returns to the runtime.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TrialClock {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<F>(
    expires_at: Timestamp,
    clock: Arc<dyn Clock>,
    sender: watch::Sender<ClockState>,
    cancel: CancellationToken,
    on_tick: F,
) where
    F: Fn(ClockState) + Send + 'static,
{
    let mut ticker = tokio::time::interval(TICK);
    let mut phase = TrialPhase::Active;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Trial clock stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let remaining_secs = trial::remaining_secs(expires_at, clock.now());
        phase = phase.on_tick(remaining_secs);
        let state = ClockState {
            phase,
            remaining_secs,
        };
        sender.send_replace(state);
        on_tick(state);

        if phase == TrialPhase::Expired {
            tracing::info!("Trial expired");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};
    use dailywatch_core::clock::ManualClock;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<ClockState>>>, impl Fn(ClockState) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |state| sink.lock().unwrap().push(state))
    }

    #[test]
    fn display_is_minutes_and_seconds() {
        let state = ClockState {
            phase: TrialPhase::Active,
            remaining_secs: 754,
        };
        assert_eq!(state.display(), "12:34");
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_reports_remaining_time() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (seen, on_tick) = recorder();
        let trial_clock =
            TrialClock::start_with_clock(t0() + chrono::Duration::minutes(15), clock, on_tick);

        let mut rx = trial_clock.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(trial_clock.state().remaining_secs, 900);
        assert_eq!(seen.lock().unwrap()[0].phase, TrialPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_at_zero_and_stops() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (seen, on_tick) = recorder();
        let trial_clock = TrialClock::start_with_clock(
            t0() + chrono::Duration::seconds(3),
            clock.clone(),
            on_tick,
        );

        let mut rx = trial_clock.subscribe();
        rx.changed().await.unwrap();
        clock.advance(chrono::Duration::seconds(5));

        while rx.borrow().phase != TrialPhase::Expired {
            rx.changed().await.unwrap();
        }
        assert_eq!(trial_clock.state().remaining_secs, 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(trial_clock.is_finished());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.last().unwrap().phase, TrialPhase::Expired);
        assert_eq!(seen.iter().filter(|s| s.phase == TrialPhase::Expired).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recomputes_from_expiry_after_a_jump() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (seen, on_tick) = recorder();
        let trial_clock = TrialClock::start_with_clock(
            t0() + chrono::Duration::minutes(15),
            clock.clone(),
            on_tick,
        );
        let mut rx = trial_clock.subscribe();
        rx.changed().await.unwrap();

        // The process slept for ten minutes.
        clock.advance(chrono::Duration::minutes(10));
        rx.changed().await.unwrap();
        assert_eq!(trial_clock.state().remaining_secs, 300);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (seen, on_tick) = recorder();
        let trial_clock =
            TrialClock::start_with_clock(t0() + chrono::Duration::minutes(15), clock, on_tick);
        let mut rx = trial_clock.subscribe();
        rx.changed().await.unwrap();

        trial_clock.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(trial_clock.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_clock_cancels_it() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (seen, on_tick) = recorder();
        let trial_clock =
            TrialClock::start_with_clock(t0() + chrono::Duration::minutes(15), clock, on_tick);
        let mut rx = trial_clock.subscribe();
        rx.changed().await.unwrap();

        drop(trial_clock);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
