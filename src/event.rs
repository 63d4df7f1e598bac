//! Runtime events for monitoring engine behavior.
//!
//! Events are non-fatal notifications. The engine keeps running after any of
//! them - they're for logging/diagnostics, not error handling.

use std::sync::Arc;

use crate::host::{ContextId, ElementId, MediaKind};

/// Runtime events emitted by the engine.
///
/// These are informational. Use the [`EventCallback`] to log them or drive
/// diagnostics.
///
/// # Example
///
/// ```
/// use page_audio::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::RoutingFailed { element, reason } => {
///             eprintln!("{} stays on native volume: {}", element, reason);
///         }
///         EngineEvent::PayloadDropped { reason, .. } => {
///             eprintln!("dropped command: {}", reason);
///         }
///         other => eprintln!("{:?}", other),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A page-created context was instrumented with a gain stage.
    ContextCaptured {
        /// The captured context.
        context: ContextId,
    },

    /// A closed context was dropped from tracking.
    ContextReleased {
        /// The released context.
        context: ContextId,
    },

    /// A media element was discovered and processed.
    MediaDiscovered {
        /// The element.
        element: ElementId,
        /// Audio or video.
        kind: MediaKind,
    },

    /// A processed media element left the document.
    MediaRemoved {
        /// The element.
        element: ElementId,
    },

    /// Routing an element through the boost graph failed.
    ///
    /// The element falls back to native-only volume control.
    RoutingFailed {
        /// The element that could not be routed.
        element: ElementId,
        /// Description of the failure.
        reason: String,
    },

    /// An inbound channel event was dropped.
    PayloadDropped {
        /// Event name the payload arrived on.
        event: String,
        /// Why it was dropped.
        reason: String,
    },

    /// A state snapshot was sent to the bridge.
    StateBroadcast {
        /// Whether the broadcast bypassed deduplication.
        forced: bool,
    },

    /// An outbound event could not be delivered.
    TransportFailed {
        /// Event name.
        event: String,
        /// Description of the error.
        error: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`EngineBuilder::on_event()`].
///
/// [`EngineBuilder::on_event()`]: crate::EngineBuilder::on_event
///
/// # Example
///
/// ```ignore
/// use page_audio::{Engine, EngineEvent};
///
/// let engine = Engine::builder()
///     .on_event(|event| {
///         tracing::debug!(?event, "engine event");
///     })
///     .attach()
///     .await?;
/// ```
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use page_audio::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
