//! Builder pattern for `Engine`.

use std::sync::Arc;

use crate::channel::{ChannelNames, ChannelToken, Transport};
use crate::host::{AudioGraph, MediaDocument};
use crate::{event_callback, Engine, EngineConfig, EngineError, EngineEvent, EventCallback};

/// Builder for configuring and attaching an [`Engine`].
///
/// Use [`Engine::builder()`] to create a new builder.
///
/// # Example
///
/// ```ignore
/// use page_audio::{ChannelTransport, Engine, MockPage};
/// use tokio::sync::mpsc;
///
/// let page = MockPage::new();
/// let (tx, rx) = mpsc::channel(32);
///
/// let engine = Engine::builder()
///     .graph(page.clone())
///     .document(page.clone())
///     .transport(ChannelTransport::new(tx))
///     .on_event(|e| tracing::debug!(?e, "engine event"))
///     .attach()
///     .await?;
/// ```
///
/// Without [`graph()`](Self::graph) the engine still attaches but only
/// controls native element volume.
#[must_use]
pub struct EngineBuilder {
    /// Audio-graph capability, if the host has one.
    graph: Option<Arc<dyn AudioGraph>>,
    /// Document capability.
    document: Option<Arc<dyn MediaDocument>>,
    /// Outbound channel to the bridge.
    transport: Option<Arc<dyn Transport>>,
    /// Token override. Otherwise taken from the document.
    token: Option<ChannelToken>,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Engine configuration.
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            graph: None,
            document: None,
            transport: None,
            token: None,
            event_callback: None,
            config: EngineConfig::default(),
        }
    }

    /// Set the audio-graph capability.
    pub fn graph<G: AudioGraph + 'static>(mut self, graph: G) -> Self {
        self.graph = Some(Arc::new(graph));
        self
    }

    /// Set the document capability.
    pub fn document<D: MediaDocument + 'static>(mut self, document: D) -> Self {
        self.document = Some(Arc::new(document));
        self
    }

    /// Set the transport used for `ready` and `state` events.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use this channel token instead of the one the loader left behind.
    pub fn token(mut self, token: ChannelToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Set a callback to receive runtime events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The token the loader left on the document, or a fresh one.
    fn resolve_token(&self, document: &dyn MediaDocument) -> ChannelToken {
        if let Some(token) = self.token.clone() {
            return token;
        }
        if let Some(token) = document
            .take_channel_token()
            .and_then(ChannelToken::from_string)
        {
            return token;
        }
        tracing::warn!("no channel token delivered, generating one; the bridge cannot reach this engine");
        ChannelToken::generate()
    }

    /// Attach the engine to the page.
    ///
    /// Processes media already in the document, announces readiness on the
    /// channel and schedules the first state broadcast.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No document is configured
    /// - No transport is configured
    /// - The `ready` signal cannot be delivered
    pub async fn attach(self) -> Result<Engine, EngineError> {
        let document = self.document.clone().ok_or(EngineError::MissingDocument)?;
        let transport = self.transport.clone().ok_or(EngineError::MissingTransport)?;

        if self.graph.is_none() {
            tracing::info!("no audio graph capability, native volume only");
        }

        let token = self.resolve_token(&*document);
        let names = ChannelNames::new(&self.config.channel_prefix, &token);

        let engine = Engine::new(
            &self.config,
            names,
            self.graph,
            document,
            transport,
            self.event_callback,
        );
        engine.start().await?;
        Ok(engine)
    }
}
