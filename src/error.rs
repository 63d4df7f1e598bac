//! Error types for page-audio.
//!
//! Errors are split into three categories:
//! - **Construction errors** ([`EngineError`]): Prevent the engine from attaching
//! - **Host errors** ([`HostError`]): A host capability refused an operation.
//!   The engine degrades (native-only volume, no boost) instead of failing.
//! - **Channel errors** ([`ChannelError`]): A command payload could not be
//!   decoded or an event could not be delivered
//!
//! Nothing here is fatal to the hosting page. Runtime problems are surfaced
//! through the [`EventCallback`](crate::EventCallback) as well.

use crate::host::{ContextId, ElementId, NodeId};

/// Errors that prevent an [`Engine`](crate::Engine) from attaching.
///
/// These are returned from [`EngineBuilder::attach()`]. Once attached, the
/// engine never returns errors to the page; failures are logged, reported as
/// events, and degrade functionality.
///
/// [`EngineBuilder::attach()`]: crate::EngineBuilder::attach
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No document was supplied to the builder.
    #[error("no media document configured - call document() before attach()")]
    MissingDocument,

    /// No transport was supplied to the builder.
    #[error("no transport configured - call transport() before attach()")]
    MissingTransport,

    /// The `ready` signal could not be delivered.
    #[error("failed to announce readiness on '{event}': {source}")]
    ReadyFailed {
        /// Event name the signal was sent on.
        event: String,
        /// The underlying channel error.
        #[source]
        source: ChannelError,
    },
}

/// Failures reported by a host capability.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host has no audio-graph constructor.
    #[error("audio graph capability unavailable")]
    Unsupported,

    /// An element source node could not be created.
    ///
    /// Typically cross-origin media, or an element already captured by
    /// another graph.
    #[error("cannot create element source for {element}: {reason}")]
    ElementSourceFailed {
        /// The media element.
        element: ElementId,
        /// Why the host refused.
        reason: String,
    },

    /// The context is closed.
    #[error("{0} is closed")]
    ContextClosed(ContextId),

    /// The context is not known to the host.
    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    /// The node is not known to the host.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Any other backend failure.
    #[error("host backend error: {0}")]
    Backend(String),
}

impl HostError {
    /// Creates an element-source failure for the given element.
    pub fn element_source(element: ElementId, reason: impl Into<String>) -> Self {
        Self::ElementSourceFailed {
            element,
            reason: reason.into(),
        }
    }

    /// Creates a generic backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Errors on the engine ↔ bridge channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The payload was not a valid command.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The requested level was not a finite number.
    #[error("invalid volume level: {0}")]
    InvalidLevel(String),

    /// The receiving side of the transport is gone.
    #[error("transport closed")]
    Closed,

    /// Custom error for user-implemented transports.
    #[error("{0}")]
    Custom(String),
}

impl ChannelError {
    /// Creates a custom channel error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}
