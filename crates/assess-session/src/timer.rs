//! Countdown timer driven by an absolute deadline.
//!
//! Every tick recomputes `deadline - now` from the clock, so a suspended
//! process or a slow tick never accumulates drift. The expiry callback is
//! stored once and taken on first use, which makes it fire at most once no
//! matter how cancellation and natural expiry interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;

/// Remaining time at or below which the countdown is critical.
pub const CRITICAL_THRESHOLD_SECS: u64 = 300;

/// Remaining time at or below which the countdown is a warning.
pub const WARNING_THRESHOLD_SECS: u64 = 900;

/// Callback invoked on every tick with the remaining whole seconds.
pub type TickCallback = Box<dyn Fn(u64) + Send + Sync>;

/// Callback invoked once when the deadline is reached.
pub type ExpireCallback = Box<dyn FnOnce() + Send>;

// ============================================================================
// Formatting
// ============================================================================

/// Formats remaining seconds as `HH:MM:SS` when at least an hour remains,
/// else `MM:SS`.
///
/// # Examples
///
/// ```
/// use assess_session::timer::format_remaining;
///
/// assert_eq!(format_remaining(0), "00:00");
/// assert_eq!(format_remaining(125), "02:05");
/// assert_eq!(format_remaining(3661), "01:01:01");
/// ```
#[must_use]
pub fn format_remaining(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Urgency band of the countdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBand {
    /// Plenty of time left, or no deadline.
    #[default]
    Normal,
    /// Fifteen minutes or less.
    Warning,
    /// Five minutes or less.
    Critical,
}

impl TimeBand {
    /// Classifies the remaining time. `None` (no deadline) is always normal.
    #[must_use]
    pub const fn for_remaining(remaining_secs: Option<u64>) -> Self {
        match remaining_secs {
            Some(s) if s <= CRITICAL_THRESHOLD_SECS => Self::Critical,
            Some(s) if s <= WARNING_THRESHOLD_SECS => Self::Warning,
            _ => Self::Normal,
        }
    }
}

/// Whole seconds from `now` until `deadline`, rounded up, floored at zero.
fn seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        u64::try_from(millis).map_or(u64::MAX, |m| m.div_ceil(1000))
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Lifecycle state of a timer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Counting down.
    Running,
    /// The deadline was reached and the expiry callback fired.
    Expired,
    /// Stopped before expiry.
    Cancelled,
    /// No deadline, or no scheduler available; never expires.
    DisplayOnly,
}

struct TimerShared {
    on_expire: Mutex<Option<ExpireCallback>>,
    expired: AtomicBool,
    cancelled: AtomicBool,
}

impl TimerShared {
    fn new(on_expire: ExpireCallback) -> Self {
        Self {
            on_expire: Mutex::new(Some(on_expire)),
            expired: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    fn take_callback(&self) -> Option<ExpireCallback> {
        match self.on_expire.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn fire(&self) {
        if let Some(callback) = self.take_callback() {
            self.expired.store(true, Ordering::SeqCst);
            callback();
        }
    }

    fn cancel(&self) -> bool {
        let suppressed = self.take_callback().is_some();
        if suppressed {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        suppressed
    }
}

/// Starts countdowns against a shared clock.
#[derive(Clone)]
pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Creates an engine that ticks every `tick_interval`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, tick_interval: Duration) -> Self {
        Self {
            clock,
            tick_interval,
        }
    }

    /// Returns the engine's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Starts a countdown.
    ///
    /// - `None` deadline: display-only, never ticks or expires.
    /// - Deadline already passed: `on_expire` runs synchronously before this
    ///   returns and no tick is ever emitted.
    /// - Otherwise a task ticks every interval until expiry or cancellation.
    ///
    /// Outside a tokio runtime the countdown cannot be scheduled; the fault is
    /// logged and the handle degrades to display-only.
    pub fn start(
        &self,
        deadline: Option<DateTime<Utc>>,
        on_tick: TickCallback,
        on_expire: ExpireCallback,
    ) -> TimerHandle {
        let shared = Arc::new(TimerShared::new(on_expire));

        let Some(deadline) = deadline else {
            tracing::debug!("No deadline, timer is display-only");
            return TimerHandle::display_only(shared, None, self.clock());
        };

        if deadline <= self.clock.now() {
            tracing::info!(%deadline, "Deadline already passed, expiring immediately");
            shared.fire();
            return TimerHandle {
                shared,
                task: None,
                deadline: Some(deadline),
                clock: self.clock(),
                display_only: false,
            };
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot schedule countdown, timer is display-only");
                return TimerHandle::display_only(shared, Some(deadline), self.clock());
            }
        };

        let task = runtime.spawn(run_countdown(
            Arc::clone(&shared),
            self.clock(),
            deadline,
            self.tick_interval,
            on_tick,
        ));

        TimerHandle {
            shared,
            task: Some(task),
            deadline: Some(deadline),
            clock: self.clock(),
            display_only: false,
        }
    }
}

async fn run_countdown(
    shared: Arc<TimerShared>,
    clock: Arc<dyn Clock>,
    deadline: DateTime<Utc>,
    period: Duration,
    on_tick: TickCallback,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if shared.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let remaining = seconds_until(deadline, clock.now());
        if remaining == 0 {
            shared.fire();
            return;
        }
        on_tick(remaining);
    }
}

/// Handle to a started countdown.
///
/// Dropping the handle cancels the countdown.
pub struct TimerHandle {
    shared: Arc<TimerShared>,
    task: Option<JoinHandle<()>>,
    deadline: Option<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
    display_only: bool,
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("deadline", &self.deadline)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl TimerHandle {
    fn display_only(
        shared: Arc<TimerShared>,
        deadline: Option<DateTime<Utc>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared,
            task: None,
            deadline,
            clock,
            display_only: true,
        }
    }

    /// Stops future ticks and suppresses a not-yet-fired expiry.
    ///
    /// Returns `true` if an expiry was suppressed.
    pub fn cancel(&mut self) -> bool {
        let suppressed = self.shared.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        suppressed
    }

    /// Returns the countdown's current state.
    #[must_use]
    pub fn status(&self) -> TimerStatus {
        if self.shared.expired.load(Ordering::SeqCst) {
            TimerStatus::Expired
        } else if self.shared.cancelled.load(Ordering::SeqCst) {
            TimerStatus::Cancelled
        } else if self.display_only {
            TimerStatus::DisplayOnly
        } else {
            TimerStatus::Running
        }
    }

    /// Returns the absolute deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Whole seconds remaining, or `None` in display-only mode.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u64> {
        if self.display_only {
            return None;
        }
        if self.shared.expired.load(Ordering::SeqCst) {
            return Some(0);
        }
        self.deadline
            .map(|deadline| seconds_until(deadline, self.clock.now()))
    }

    /// Remaining time as a `Duration`, or `None` in display-only mode.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_secs().map(Duration::from_secs)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
