//! Prompt timeout countdown
//!
//! The countdown runs as its own task and reports progress over a channel.
//! The owner steers it through a watch channel (run, pause, cancel); no
//! other state is shared with the task.

use crate::config::ConfigSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// Notifications emitted by a running countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One second elapsed; seconds left
    Tick(u64),
    /// Reached zero. Terminal.
    Expired,
    /// Acknowledges `cancel`. Terminal.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Cancel,
}

/// Handle to a countdown task
pub struct TimeoutCountdown {
    refill: Arc<dyn ConfigSource>,
    control: Option<watch::Sender<Control>>,
    task: Option<JoinHandle<()>>,
}

impl TimeoutCountdown {
    /// Create an idle countdown.
    ///
    /// `refill` supplies the timeout a paused countdown is reset to.
    pub fn new(refill: Arc<dyn ConfigSource>) -> Self {
        Self {
            refill,
            control: None,
            task: None,
        }
    }

    /// Start counting down from `seconds`.
    ///
    /// Zero expires immediately without ticking. Starting again cancels the
    /// previous run.
    pub fn start(&mut self, seconds: u64) -> mpsc::UnboundedReceiver<CountdownEvent> {
        self.cancel();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = watch::channel(Control::Run);
        let refill = self.refill.clone();

        self.task = Some(tokio::spawn(run(seconds, refill, control_rx, events_tx)));
        self.control = Some(control_tx);

        events_rx
    }

    /// Stop counting down. While paused the remaining time is reset to the
    /// configured timeout every second and no ticks are delivered.
    pub fn pause(&self) {
        self.set(Control::Pause);
    }

    pub fn resume(&self) {
        self.set(Control::Run);
    }

    /// Stop the countdown. Safe to call repeatedly or after expiry.
    pub fn cancel(&self) {
        self.set(Control::Cancel);
    }

    fn set(&self, next: Control) {
        let Some(control) = &self.control else {
            return;
        };
        control.send_if_modified(|current| {
            // Cancel is final
            if *current == next || *current == Control::Cancel {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl Drop for TimeoutCountdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    mut remaining: u64,
    refill: Arc<dyn ConfigSource>,
    mut control: watch::Receiver<Control>,
    events: mpsc::UnboundedSender<CountdownEvent>,
) {
    if remaining == 0 {
        tracing::debug!("Countdown started at zero, expiring");
        let _ = events.send(CountdownEvent::Expired);
        return;
    }

    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = control.changed() => {
                // A dropped handle counts as a cancel
                if changed.is_err() || *control.borrow() == Control::Cancel {
                    tracing::debug!("Countdown cancelled with {}s left", remaining);
                    let _ = events.send(CountdownEvent::Cancelled);
                    return;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let mode = *control.borrow();
        match mode {
            Control::Cancel => {
                let _ = events.send(CountdownEvent::Cancelled);
                return;
            }
            Control::Pause => {
                remaining = refilled(&refill, remaining);
            }
            Control::Run => {
                remaining -= 1;
                tracing::trace!("Countdown tick: {}s left", remaining);
                let _ = events.send(CountdownEvent::Tick(remaining));
            }
        }

        if remaining == 0 {
            tracing::debug!("Countdown expired");
            let _ = events.send(CountdownEvent::Expired);
            return;
        }
    }
}

/// Timeout to refill a paused countdown with, keeping `current` if the
/// configuration cannot be read
fn refilled(refill: &Arc<dyn ConfigSource>, current: u64) -> u64 {
    let timeout = refill
        .load()
        .and_then(|config| config.prompt.timeout_secs().map_err(Into::into));

    match timeout {
        Ok(seconds) => seconds,
        Err(e) => {
            tracing::warn!("Cannot refill paused countdown: {}", e);
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn refill(seconds: i64) -> Arc<dyn ConfigSource> {
        let mut config = Config::default();
        config.prompt.default_timeout = seconds;
        Arc::new(config)
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<CountdownEvent>) -> Vec<CountdownEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_expires_without_ticks() {
        let mut countdown = TimeoutCountdown::new(refill(15));
        let mut rx = countdown.start(0);
        assert_eq!(drain(&mut rx).await, vec![CountdownEvent::Expired]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_then_expires() {
        let start = Instant::now();
        let mut countdown = TimeoutCountdown::new(refill(15));
        let mut rx = countdown.start(3);

        assert_eq!(
            drain(&mut rx).await,
            vec![
                CountdownEvent::Tick(2),
                CountdownEvent::Tick(1),
                CountdownEvent::Tick(0),
                CountdownEvent::Expired,
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_terminal_and_idempotent() {
        let mut countdown = TimeoutCountdown::new(refill(15));
        let mut rx = countdown.start(5);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        countdown.cancel();
        countdown.cancel();

        assert_eq!(
            drain(&mut rx).await,
            vec![
                CountdownEvent::Tick(4),
                CountdownEvent::Tick(3),
                CountdownEvent::Cancelled,
            ]
        );

        // Further calls after the terminal event do nothing
        countdown.cancel();
        countdown.pause();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_expiry_is_noop() {
        let mut countdown = TimeoutCountdown::new(refill(15));
        let mut rx = countdown.start(1);

        assert_eq!(
            drain(&mut rx).await,
            vec![CountdownEvent::Tick(0), CountdownEvent::Expired]
        );
        countdown.cancel();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_refills_from_config() {
        let mut countdown = TimeoutCountdown::new(refill(2));
        let mut rx = countdown.start(5);
        countdown.pause();

        // Paused far past the starting value: no ticks, no expiry
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());

        // Resuming continues from the refilled value
        countdown.resume();
        assert_eq!(
            drain(&mut rx).await,
            vec![
                CountdownEvent::Tick(1),
                CountdownEvent::Tick(0),
                CountdownEvent::Expired,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_with_zero_refill_expires() {
        let mut countdown = TimeoutCountdown::new(refill(0));
        let mut rx = countdown.start(5);
        countdown.pause();

        assert_eq!(drain(&mut rx).await, vec![CountdownEvent::Expired]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let mut countdown = TimeoutCountdown::new(refill(15));
        let mut rx = countdown.start(10);
        drop(countdown);

        assert_eq!(drain(&mut rx).await, vec![CountdownEvent::Cancelled]);
    }
}
