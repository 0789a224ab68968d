//! Observability side channel for the cart state manager.
//!
//! Storage and network failures never propagate to the UI. They are
//! reported here instead, through an injected [`Telemetry`] implementation.
//!
//! - [`TracingTelemetry`] - Logs with `tracing` and records Sentry breadcrumbs
//!   and events (no-ops when Sentry is not initialized)
//! - [`RecordingTelemetry`] - Collects events in memory for assertions

use std::sync::{Mutex, PoisonError};

/// Cart operation that triggered a telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOperation {
    Add,
    Remove,
    SetQuantity,
    Clear,
    Replace,
    Merge,
    Flush,
}

impl CartOperation {
    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::SetQuantity => "set_quantity",
            Self::Clear => "clear",
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Flush => "flush",
        }
    }
}

/// Something worth observing happened inside the cart subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A mutation completed in memory.
    CartMutated {
        operation: CartOperation,
        line_count: usize,
    },
    /// The durable write after a mutation failed. The mutation stands.
    PersistenceFailed {
        operation: CartOperation,
        error: String,
    },
    /// A write succeeded after one or more earlier failures.
    PersistenceRecovered { operation: CartOperation },
    /// The stored cart could not be decoded and was ignored.
    MalformedPersistedState { error: String },
    /// Fetching the server cart failed; reconciliation was aborted.
    RemoteFetchFailed { error: String },
    /// Pushing a cart to the server failed.
    RemotePushFailed { error: String },
    /// A reconciliation finished installing its result.
    Reconciled {
        remote_lines: usize,
        local_lines: usize,
        merged_lines: usize,
    },
}

impl TelemetryEvent {
    /// Whether this event describes a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailed { .. }
                | Self::MalformedPersistedState { .. }
                | Self::RemoteFetchFailed { .. }
                | Self::RemotePushFailed { .. }
        )
    }
}

/// Receiver for telemetry events.
pub trait Telemetry: Send + Sync {
    /// Report an event. Must not block or panic.
    fn report(&self, event: &TelemetryEvent);
}

/// Default telemetry: structured `tracing` logs plus Sentry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn report(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::CartMutated {
                operation,
                line_count,
            } => {
                tracing::debug!(operation = operation.as_str(), line_count, "Cart mutated");
                add_breadcrumb("cart", operation.as_str(), sentry::Level::Info);
            }
            TelemetryEvent::PersistenceFailed { operation, error } => {
                tracing::warn!(
                    operation = operation.as_str(),
                    error = %error,
                    "Cart write-through failed, will retry on next mutation"
                );
                sentry::capture_message(
                    &format!("Cart persistence failed: {error}"),
                    sentry::Level::Warning,
                );
            }
            TelemetryEvent::PersistenceRecovered { operation } => {
                tracing::info!(operation = operation.as_str(), "Cart write-through recovered");
            }
            TelemetryEvent::MalformedPersistedState { error } => {
                tracing::warn!(error = %error, "Stored cart is malformed, starting empty");
                sentry::capture_message(
                    &format!("Malformed persisted cart: {error}"),
                    sentry::Level::Warning,
                );
            }
            TelemetryEvent::RemoteFetchFailed { error } => {
                tracing::warn!(error = %error, "Fetching server cart failed, keeping local cart");
                sentry::capture_message(
                    &format!("Server cart fetch failed: {error}"),
                    sentry::Level::Warning,
                );
            }
            TelemetryEvent::RemotePushFailed { error } => {
                tracing::warn!(error = %error, "Pushing cart to server failed");
                sentry::capture_message(
                    &format!("Server cart push failed: {error}"),
                    sentry::Level::Warning,
                );
            }
            TelemetryEvent::Reconciled {
                remote_lines,
                local_lines,
                merged_lines,
            } => {
                tracing::info!(remote_lines, local_lines, merged_lines, "Cart reconciled");
                add_breadcrumb("reconcile", "merged", sentry::Level::Info);
            }
        }
    }
}

pub(crate) fn add_breadcrumb(category: &str, message: &str, level: sentry::Level) {
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level,
        ..Default::default()
    });
}

/// Telemetry that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded failure events, oldest first.
    #[must_use]
    pub fn failures(&self) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(TelemetryEvent::is_failure)
            .collect()
    }
}

impl Telemetry for RecordingTelemetry {
    fn report(&self, event: &TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
