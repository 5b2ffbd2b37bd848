//! Session event types and broadcasting.
//!
//! The controller publishes an event for every observable state change.
//! Presentation layers subscribe and redraw; events are not replayed to late
//! subscribers.
//!
//! # Event Types
//!
//! - `tick` - Countdown update
//! - `status_changed` - Assessment status transition
//! - `navigated` - Active question or language changed
//! - `outcome` - A request result was applied
//! - `error` - An action was rejected or a request failed
//!
//! # Example
//!
//! ```
//! use assess_session::events::{EventBroadcaster, SessionEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::error("another request is still running"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{}", event.event_name());
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{AssessmentStatus, Language, QuestionId};
use crate::outcome::{ExecutionMode, VerdictSummary};
use crate::timer::{format_remaining, TimeBand};

/// Default per-subscriber buffer size.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `tick` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickPayload {
    /// Whole seconds left.
    pub remaining_secs: u64,
    /// Formatted countdown.
    pub display: String,
    /// Urgency band.
    pub band: TimeBand,
}

/// Payload for the `status_changed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangedPayload {
    /// Previous status.
    pub from: AssessmentStatus,
    /// New status.
    pub to: AssessmentStatus,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
}

/// Payload for the `navigated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatedPayload {
    /// Zero-based index of the active question.
    pub index: usize,
    /// Active question id.
    pub question_id: QuestionId,
    /// Active language.
    pub language: Language,
}

/// Payload for the `outcome` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomePayload {
    /// Question the outcome belongs to.
    pub question_id: QuestionId,
    /// Mode of the resolved request.
    pub mode: ExecutionMode,
    /// Verdict counts, for Run and Submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<VerdictSummary>,
    /// Whether the collaborator failed.
    pub failed: bool,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Observable session events.
///
/// Serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Countdown update.
    Tick(TickPayload),
    /// Assessment status transition.
    StatusChanged(StatusChangedPayload),
    /// Active question or language changed.
    Navigated(NavigatedPayload),
    /// A request result was applied.
    Outcome(OutcomePayload),
    /// An action was rejected or a request failed.
    Error(ErrorPayload),
}

impl SessionEvent {
    /// Creates a `Tick` event.
    #[must_use]
    pub fn tick(remaining_secs: u64) -> Self {
        Self::Tick(TickPayload {
            remaining_secs,
            display: format_remaining(remaining_secs),
            band: TimeBand::for_remaining(Some(remaining_secs)),
        })
    }

    /// Creates a `StatusChanged` event stamped with `timestamp`.
    #[must_use]
    pub const fn status_changed(
        from: AssessmentStatus,
        to: AssessmentStatus,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::StatusChanged(StatusChangedPayload {
            from,
            to,
            timestamp,
        })
    }

    /// Creates a `Navigated` event.
    #[must_use]
    pub const fn navigated(index: usize, question_id: QuestionId, language: Language) -> Self {
        Self::Navigated(NavigatedPayload {
            index,
            question_id,
            language,
        })
    }

    /// Creates an `Outcome` event.
    #[must_use]
    pub const fn outcome(
        question_id: QuestionId,
        mode: ExecutionMode,
        summary: Option<VerdictSummary>,
        failed: bool,
    ) -> Self {
        Self::Outcome(OutcomePayload {
            question_id,
            mode,
            summary,
            failed,
        })
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::StatusChanged(_) => "status_changed",
            Self::Navigated(_) => "navigated",
            Self::Outcome(_) => "outcome",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to every subscriber.
///
/// Uses a tokio broadcast channel. A subscriber that falls behind receives
/// `Lagged` and misses the overwritten events.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the given per-subscriber buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event, returning how many subscribers will see it.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is subscribed.
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
