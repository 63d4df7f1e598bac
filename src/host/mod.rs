//! Host capability interface.
//!
//! The engine runs inside a page it does not control. Everything it needs from
//! that page goes through two traits:
//!
//! - [`AudioGraph`]: the host's audio-graph API (contexts, gain nodes,
//!   element sources, connections)
//! - [`MediaDocument`]: the document's media elements and their native volume
//!
//! A host adapter implements these against the real platform and forwards the
//! page's own activity (context construction, `connect` calls, DOM mutations)
//! to the [`Engine`](crate::Engine) hooks. [`MockPage`] implements both traits
//! in memory so the whole engine can be exercised without an audio backend.

mod ids;
mod mock;

pub use ids::{ContextId, ElementId, NodeId};
pub use mock::MockPage;

use futures::future::BoxFuture;

use crate::HostError;

/// Lifecycle state of an audio-graph context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Processing audio.
    Running,
    /// Alive but paused, typically by an autoplay policy.
    Suspended,
    /// Permanently closed. Its nodes must not be touched again.
    Closed,
}

impl ContextState {
    /// Returns `true` unless the context is closed.
    ///
    /// Suspended contexts still count as live.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// Kind of a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// An `<audio>` element.
    Audio,
    /// A `<video>` element.
    Video,
}

/// A child `<source>` descriptor of a media element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// The `src` attribute, if any.
    pub src: Option<String>,
    /// The declared MIME type (`type` attribute), possibly with a `codecs` parameter.
    pub mime: Option<String>,
}

/// What the document reports about one media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Audio or video.
    pub kind: MediaKind,
    /// The resolved source URL the element is playing, if known.
    pub current_src: Option<String>,
    /// Child source descriptors in document order.
    pub sources: Vec<SourceDescriptor>,
}

impl MediaDescriptor {
    /// Creates a descriptor with no child sources.
    pub fn new(kind: MediaKind, current_src: Option<String>) -> Self {
        Self {
            kind,
            current_src,
            sources: Vec::new(),
        }
    }
}

/// The host's audio-graph API.
///
/// `connect` is the host's *native* connection primitive. The engine calls it
/// directly for its own wiring; page-authored connections must be sent through
/// [`Engine::connect`](crate::Engine::connect) so they can be redirected.
pub trait AudioGraph: Send + Sync {
    /// Creates a new context owned by the caller.
    ///
    /// Returns [`HostError::Unsupported`] when the platform has no audio-graph
    /// constructor.
    fn create_context(&self) -> Result<ContextId, HostError>;

    /// Current lifecycle state of a context. Unknown contexts report `Closed`.
    fn context_state(&self, context: ContextId) -> ContextState;

    /// The context's real output destination.
    fn destination(&self, context: ContextId) -> Result<NodeId, HostError>;

    /// Creates a gain node with unity gain.
    fn create_gain(&self, context: ContextId) -> Result<NodeId, HostError>;

    /// Writes a gain node's control value.
    fn set_gain(&self, gain: NodeId, value: f64) -> Result<(), HostError>;

    /// Connects `from`'s output to `to`'s input.
    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), HostError>;

    /// Disconnects all of `node`'s outputs.
    fn disconnect(&self, node: NodeId) -> Result<(), HostError>;

    /// Creates a node that pulls its signal from a media element.
    ///
    /// Fails for cross-origin media or for an element already captured by
    /// another graph.
    fn create_element_source(
        &self,
        context: ContextId,
        element: ElementId,
    ) -> Result<NodeId, HostError>;

    /// Asks a suspended context to resume.
    ///
    /// The engine never awaits this on the routing path; it is driven
    /// fire-and-forget.
    fn resume(&self, context: ContextId) -> BoxFuture<'static, Result<(), HostError>>;
}

/// The page document as seen by the engine.
pub trait MediaDocument: Send + Sync {
    /// All media elements currently connected to the document.
    fn media_elements(&self) -> Vec<ElementId>;

    /// Media elements within a subtree, including `node` itself.
    fn media_within(&self, node: ElementId) -> Vec<ElementId>;

    /// The media element a node belongs to: the node itself if it is media,
    /// or its parent media element if it is a `<source>` child.
    fn owning_media(&self, node: ElementId) -> Option<ElementId>;

    /// Describes a connected media element. Returns `None` once removed.
    fn describe(&self, element: ElementId) -> Option<MediaDescriptor>;

    /// Reads the element's native volume (0.0..=1.0).
    fn volume(&self, element: ElementId) -> Option<f64>;

    /// Writes the element's native volume. Callers clamp to 0.0..=1.0.
    fn set_volume(&self, element: ElementId, volume: f64);

    /// Starts forwarding the element's metadata/load/duration/error/play
    /// events to [`Engine::media_event`](crate::Engine::media_event).
    fn attach_listeners(&self, element: ElementId);

    /// Reads and removes the channel token attached to the loader element.
    fn take_channel_token(&self) -> Option<String>;
}
